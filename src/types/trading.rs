//! Trading Types
//!
//! Orders, positions and trade records for the paper trading engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// How a position is financed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradingType {
    /// Fully paid holdings
    #[default]
    Spot,
    /// Half paid, half borrowed
    Margin,
    /// N-times leveraged exposure, liquidatable
    Leverage,
    /// Option contracts paid by premium
    Options,
}

impl std::fmt::Display for TradingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingType::Spot => write!(f, "spot"),
            TradingType::Margin => write!(f, "margin"),
            TradingType::Leverage => write!(f, "leverage"),
            TradingType::Options => write!(f, "options"),
        }
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Execute at the specified price or better
    Limit,
    /// Execute immediately
    Market,
    /// Execute once the stop price is crossed
    StopLoss,
    /// Becomes a limit order once the stop price is crossed
    StopLimit,
}

impl OrderKind {
    pub fn is_stop(&self) -> bool {
        matches!(self, OrderKind::StopLoss | OrderKind::StopLimit)
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Limit => write!(f, "limit"),
            OrderKind::Market => write!(f, "market"),
            OrderKind::StopLoss => write!(f, "stop_loss"),
            OrderKind::StopLimit => write!(f, "stop_limit"),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting, waiting for its conditions
    Open,
    /// Stop-limit whose stop was crossed, now resting as a limit
    Triggered,
    /// Executed
    Filled,
    /// Cancelled by the user
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Triggered => write!(f, "triggered"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Option type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Instrument classification used by portfolio views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Crypto,
    Stock,
    Etf,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Crypto => write!(f, "crypto"),
            AssetType::Stock => write!(f, "stock"),
            AssetType::Etf => write!(f, "etf"),
        }
    }
}

/// Trade record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// What produced a trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Fill,
    Close,
    Liquidation,
    Exercise,
    Expiry,
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::Fill => write!(f, "fill"),
            TradeKind::Close => write!(f, "close"),
            TradeKind::Liquidation => write!(f, "liquidation"),
            TradeKind::Exercise => write!(f, "exercise"),
            TradeKind::Expiry => write!(f, "expiry"),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Terms of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    /// Strike price
    pub strike: f64,
    /// Call or put
    pub option_type: OptionType,
    /// Expiration timestamp (ms)
    pub expiration: i64,
}

impl OptionContract {
    /// Intrinsic value per contract at the given underlying price.
    pub fn intrinsic_value(&self, underlying_price: f64) -> f64 {
        match self.option_type {
            OptionType::Call => (underlying_price - self.strike).max(0.0),
            OptionType::Put => (self.strike - underlying_price).max(0.0),
        }
    }

    /// Whole and fractional days until expiration, never negative.
    pub fn days_to_expiration(&self, now_ms: i64) -> f64 {
        let ms = (self.expiration - now_ms).max(0) as f64;
        ms / 86_400_000.0
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expiration
    }
}

// =============================================================================
// Order Types
// =============================================================================

/// A user's instruction to trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Monotonically assigned order ID
    pub id: u64,
    /// Symbol being traded (e.g., "BTC", "AAPL")
    pub symbol: String,
    /// Order kind
    pub kind: OrderKind,
    /// Buy or sell
    pub side: OrderSide,
    /// Quantity to trade (fractional for crypto)
    pub quantity: f64,
    /// Limit price, also the fill price
    pub price: f64,
    /// Stop/trigger price (for stop orders)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
    /// Current order status
    pub status: OrderStatus,
    /// How the resulting position is financed
    pub trading_type: TradingType,
    /// Leverage multiplier (leverage trading only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    /// Contract terms (options trading only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<OptionContract>,
    /// Premium per contract computed at placement (options trading only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<f64>,
    /// When order was created (ms)
    pub created_at: i64,
    /// When order was last updated (ms)
    pub updated_at: i64,
}

impl Order {
    /// Open or triggered orders still wait on the market.
    pub fn is_resting(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Triggered)
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Key of the position this order opens, grows or reduces.
    pub fn position_key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            trading_type: self.trading_type,
            leverage: self.leverage,
            option: self.option,
        }
    }
}

/// Request to place an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub kind: OrderKind,
    pub side: OrderSide,
    pub quantity: f64,
    /// Required for limit and stop-limit orders. Market orders default to
    /// the current price, stop-loss orders to the stop price.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub trading_type: TradingType,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub option_type: Option<OptionType>,
    /// Expiration timestamp (ms)
    #[serde(default)]
    pub expiration: Option<i64>,
}

impl PlaceOrderRequest {
    /// A spot request with no price set.
    pub fn new(symbol: &str, kind: OrderKind, side: OrderSide, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            side,
            quantity,
            price: None,
            stop_price: None,
            trading_type: TradingType::Spot,
            leverage: None,
            strike: None,
            option_type: None,
            expiration: None,
        }
    }

    pub fn market(symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Self::new(symbol, OrderKind::Market, side, quantity)
    }

    pub fn limit(symbol: &str, side: OrderSide, quantity: f64, price: f64) -> Self {
        Self::new(symbol, OrderKind::Limit, side, quantity).with_price(price)
    }

    pub fn stop_loss(symbol: &str, side: OrderSide, quantity: f64, stop_price: f64) -> Self {
        let mut request = Self::new(symbol, OrderKind::StopLoss, side, quantity);
        request.stop_price = Some(stop_price);
        request
    }

    pub fn stop_limit(
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        stop_price: f64,
        limit_price: f64,
    ) -> Self {
        let mut request = Self::new(symbol, OrderKind::StopLimit, side, quantity);
        request.stop_price = Some(stop_price);
        request.price = Some(limit_price);
        request
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_margin(mut self) -> Self {
        self.trading_type = TradingType::Margin;
        self
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.trading_type = TradingType::Leverage;
        self.leverage = Some(leverage);
        self
    }

    pub fn with_option(mut self, strike: f64, option_type: OptionType, expiration: i64) -> Self {
        self.trading_type = TradingType::Options;
        self.strike = Some(strike);
        self.option_type = Some(option_type);
        self.expiration = Some(expiration);
        self
    }
}

/// Fields an open order may change in place. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOrderRequest {
    #[serde(default)]
    pub kind: Option<OrderKind>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stop_price: Option<f64>,
}

// =============================================================================
// Position Types
// =============================================================================

/// Aggregation key for positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionKey {
    pub symbol: String,
    pub trading_type: TradingType,
    pub leverage: Option<f64>,
    /// Contracts with different terms never merge.
    pub option: Option<OptionContract>,
}

/// An aggregated holding in one symbol under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Unique position ID
    pub id: u64,
    /// Symbol (e.g., "BTC", "AAPL")
    pub symbol: String,
    /// Current quantity held, always positive
    pub quantity: f64,
    /// Weighted average entry price
    pub avg_price: f64,
    /// Last market price applied
    pub current_price: f64,
    /// Unrealized P&L
    pub pnl: f64,
    /// Unrealized P&L as percentage
    pub pnl_percentage: f64,
    pub trading_type: TradingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    /// Funds committed by the user
    pub margin_used: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<f64>,
    /// Margin trading only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrowed_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<OptionContract>,
    /// Weighted average premium per contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intrinsic_value: Option<f64>,
    /// When position was opened (ms)
    pub created_at: i64,
    /// When position was last updated (ms)
    pub updated_at: i64,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            trading_type: self.trading_type,
            leverage: self.leverage,
            option: self.option,
        }
    }

    pub fn matches(&self, key: &PositionKey) -> bool {
        self.symbol == key.symbol
            && self.trading_type == key.trading_type
            && self.leverage == key.leverage
            && self.option == key.option
    }

    /// Unleveraged P&L on the underlying move.
    pub fn base_pnl(&self) -> f64 {
        (self.current_price - self.avg_price) * self.quantity
    }

    /// Liquidation threshold for a long at the given leverage.
    pub fn liquidation_threshold(avg_price: f64, leverage: f64) -> f64 {
        avg_price * (1.0 - 1.0 / leverage)
    }

    /// Revalue the position at a new market price.
    pub fn update_price(&mut self, price: f64, now_ms: i64) {
        self.current_price = price;
        self.updated_at = now_ms;

        if let (Some(contract), Some(premium)) = (self.option, self.premium) {
            let intrinsic = contract.intrinsic_value(price);
            self.intrinsic_value = Some(intrinsic);
            self.pnl = (intrinsic - premium) * self.quantity;
            if premium > 0.0 {
                self.pnl_percentage = (intrinsic - premium) / premium * 100.0;
            }
            return;
        }

        let base = self.base_pnl();
        self.pnl = match (self.trading_type, self.leverage) {
            (TradingType::Leverage, Some(leverage)) => base * leverage,
            _ => base,
        };
        // Percentage stays unleveraged; leverage scales the absolute figure only.
        if self.avg_price > 0.0 {
            self.pnl_percentage = (price - self.avg_price) / self.avg_price * 100.0;
        }
    }

    /// Check if position should be liquidated at current price.
    pub fn should_liquidate(&self) -> bool {
        self.liquidation_price
            .map(|liq| self.current_price <= liq)
            .unwrap_or(false)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.option.map(|c| c.is_expired(now_ms)).unwrap_or(false)
    }

    /// What a user-initiated close pays back.
    pub fn close_value(&self) -> f64 {
        match self.trading_type {
            TradingType::Leverage => {
                self.margin_used + self.base_pnl() * self.leverage.unwrap_or(1.0)
            }
            TradingType::Margin => self.margin_used + self.base_pnl(),
            TradingType::Options => self.intrinsic_value.unwrap_or(0.0) * self.quantity,
            TradingType::Spot => self.current_price * self.quantity,
        }
    }
}

// =============================================================================
// Trade Types
// =============================================================================

/// Immutable execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Unique trade ID
    pub id: u64,
    /// Order that generated this trade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    /// Position this trade affected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<u64>,
    pub symbol: String,
    /// Display name from the instrument catalog
    pub name: String,
    pub asset_type: AssetType,
    pub trading_type: TradingType,
    pub kind: TradeKind,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    /// Realized P&L
    pub pnl: f64,
    pub status: TradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    /// When the trade was recorded (ms)
    pub timestamp: i64,
}

/// Read-side filter for the trade log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFilter {
    #[serde(default)]
    pub status: Option<TradeStatus>,
    #[serde(default)]
    pub trading_type: Option<TradingType>,
}

impl TradeFilter {
    pub fn matches(&self, trade: &Trade) -> bool {
        self.status.map_or(true, |s| trade.status == s)
            && self.trading_type.map_or(true, |t| trade.trading_type == t)
    }
}

/// Aggregates over closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSummary {
    pub count: usize,
    pub realized_pnl: f64,
    pub wins: usize,
    pub losses: usize,
}
