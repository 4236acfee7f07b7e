//! Trading Service
//!
//! Paper trading engine for spot, margin, leveraged and options positions:
//! - Order management (place, modify, cancel, fill)
//! - Price-driven fills, stop triggers and stop-limit promotion
//! - Position revaluation, liquidation, option exercise and expiry
//! - Append-only trade log and a shared balance ledger
//!
//! All mutable state sits behind one lock. Every public operation takes the
//! lock, runs to completion and publishes its events after releasing it, so a
//! price update never interleaves with order placement.

use crate::services::balance::{BalanceError, BalanceService};
use crate::services::catalog;
use crate::services::clock::{Clock, SystemClock};
use crate::services::order_book::{limit_fillable, stop_triggered, OrderBook};
use crate::services::positions::{FillOutcome, PositionLedger, QUANTITY_EPSILON};
use crate::services::price_store::MarketPriceStore;
use crate::services::pricing::PricingModel;
use crate::services::snapshot_store::{EngineSnapshot, SnapshotError, SnapshotStore};
use crate::services::trade_log::TradeLog;
use crate::types::{
    EngineEvent, ModifyOrderRequest, OptionContract, Order, OrderKind, OrderSide, OrderStatus,
    PlaceOrderRequest, Position, Trade, TradeFilter, TradeKind, TradeStatus, TradeSummary,
    TradingType,
};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Insufficient balance: need {needed:.2}, have {available:.2}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("No matching position for {0}")]
    NoMatchingPosition(String),

    #[error("Insufficient quantity: requested {requested}, held {available}")]
    InsufficientQuantity { requested: f64, available: f64 },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<BalanceError> for TradingError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::Insufficient { needed, available } => {
                TradingError::InsufficientBalance { needed, available }
            }
        }
    }
}

impl From<SnapshotError> for TradingError {
    fn from(e: SnapshotError) -> Self {
        TradingError::Storage(e.to_string())
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Balance currency orders are paid from
    pub currency: String,
    /// Price used for symbols with no recorded or catalog price
    pub default_price: f64,
    pub pricing: PricingModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "networth".to_string(),
            default_price: 100.0,
            pricing: PricingModel::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct EngineState {
    orders: OrderBook,
    positions: PositionLedger,
    trades: TradeLog,
}

impl EngineState {
    fn new() -> Self {
        Self {
            orders: OrderBook::new(),
            positions: PositionLedger::new(),
            trades: TradeLog::new(),
        }
    }
}

/// Paper trading engine.
pub struct TradingService {
    state: Mutex<EngineState>,
    prices: Arc<MarketPriceStore>,
    balance: Arc<dyn BalanceService>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl TradingService {
    /// Create a trading service drawing from the given balance ledger.
    pub fn new(config: EngineConfig, balance: Arc<dyn BalanceService>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(EngineState::new()),
            prices: Arc::new(MarketPriceStore::new(config.default_price)),
            balance,
            clock: Arc::new(SystemClock),
            config,
            snapshots: None,
            event_tx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_price_store(mut self, prices: Arc<MarketPriceStore>) -> Self {
        self.prices = prices;
        self
    }

    /// Persist a snapshot after every mutating operation.
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Subscribe to engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn price_store(&self) -> Arc<MarketPriceStore> {
        self.prices.clone()
    }

    pub fn balance(&self) -> f64 {
        self.balance.get_balance(&self.config.currency)
    }

    pub fn get_price(&self, symbol: &str) -> f64 {
        self.prices.get_price(symbol)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, TradingError> {
        self.state
            .lock()
            .map_err(|_| TradingError::Storage("engine state lock poisoned".to_string()))
    }

    fn txn<'a>(&'a self, state: &'a mut EngineState) -> Txn<'a> {
        Txn {
            service: self,
            state,
            events: Vec::new(),
            now: self.clock.now_ms(),
        }
    }

    /// Persist (while still holding the lock), then publish.
    fn commit(
        &self,
        state: MutexGuard<'_, EngineState>,
        events: Vec<EngineEvent>,
    ) -> Vec<EngineEvent> {
        if let Some(ref store) = self.snapshots {
            let snapshot = EngineSnapshot {
                orders: state.orders.clone(),
                positions: state.positions.clone(),
                trades: state.trades.clone(),
                prices: self.prices.snapshot(),
                taken_at: self.clock.now_ms(),
            };
            if let Err(e) = store.save(&snapshot) {
                warn!("Failed to persist engine snapshot: {}", e);
            }
        }
        drop(state);

        for event in &events {
            debug!("Engine event {}", event.name());
            let _ = self.event_tx.send(event.clone());
        }
        events
    }

    // ==========================================================================
    // Order Management
    // ==========================================================================

    /// Place a new order.
    ///
    /// Buys reserve their full cost at placement. Market orders fill at once;
    /// limit and stop orders fill or trigger at once if the current price
    /// already satisfies them.
    pub fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, TradingError> {
        let mut state = self.lock()?;
        let now = self.clock.now_ms();
        let mut order = self.build_order(&request, now)?;

        match order.side {
            OrderSide::Sell => check_sell_cover(&state.positions, &order)?,
            OrderSide::Buy => {
                let cost = self.config.pricing.order_cost(&order);
                self.balance.try_debit(&self.config.currency, cost)?;
            }
        }

        order.id = state.orders.next_id();
        let id = order.id;
        state.orders.insert(order.clone());
        info!(
            "Placed order {} {} {} {} x{} @ {:.2} ({})",
            id, order.kind, order.side, order.symbol, order.quantity, order.price, order.trading_type
        );

        let mut txn = self.txn(&mut state);
        txn.events.push(EngineEvent::OrderPlaced { order });
        txn.evaluate(id);
        let events = std::mem::take(&mut txn.events);

        let placed = state
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| TradingError::Storage(format!("order {} vanished", id)))?;
        self.commit(state, events);
        Ok(placed)
    }

    /// Validate a request and turn it into an unnumbered order.
    fn build_order(&self, request: &PlaceOrderRequest, now: i64) -> Result<Order, TradingError> {
        let symbol = request.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(TradingError::InvalidOrder("Symbol is required".to_string()));
        }
        let market_price = self.prices.get_price(&symbol);

        let price = match request.kind {
            OrderKind::Market => request.price.unwrap_or(market_price),
            OrderKind::StopLoss => request
                .price
                .or(request.stop_price)
                .ok_or_else(|| {
                    TradingError::InvalidOrder("Stop order requires stop_price".to_string())
                })?,
            OrderKind::Limit | OrderKind::StopLimit => request
                .price
                .ok_or_else(|| {
                    TradingError::InvalidOrder(format!("{} order requires price", request.kind))
                })?,
        };

        let leverage = match request.trading_type {
            TradingType::Leverage => match request.leverage {
                Some(l) if l.is_finite() && l >= 1.0 => Some(l),
                _ => {
                    return Err(TradingError::InvalidOrder(
                        "Leverage trading requires leverage >= 1".to_string(),
                    ))
                }
            },
            _ => None,
        };

        let option = match request.trading_type {
            TradingType::Options => match (
                request.strike,
                request.option_type,
                request.expiration,
            ) {
                (Some(strike), Some(option_type), Some(expiration)) if strike > 0.0 => {
                    Some(OptionContract { strike, option_type, expiration })
                }
                _ => {
                    return Err(TradingError::InvalidOrder(
                        "Options order requires strike, option type and expiration".to_string(),
                    ))
                }
            },
            _ => None,
        };
        let premium = option.map(|c| self.config.pricing.option_premium(&c, market_price, now));

        let order = Order {
            id: 0,
            symbol,
            kind: request.kind,
            side: request.side,
            quantity: request.quantity,
            price,
            stop_price: request.stop_price,
            status: OrderStatus::Open,
            trading_type: request.trading_type,
            leverage,
            option,
            premium,
            created_at: now,
            updated_at: now,
        };
        validate_terms(&order)?;
        Ok(order)
    }

    /// Cancel a resting order, refunding a buy's reserved cost.
    /// Returns `None` if the order is missing or no longer resting.
    pub fn cancel_order(&self, order_id: u64) -> Result<Option<Order>, TradingError> {
        let mut state = self.lock()?;
        let now = self.clock.now_ms();
        let order = match state.orders.get_mut(order_id) {
            Some(order) if order.is_resting() => order,
            _ => return Ok(None),
        };

        order.status = OrderStatus::Cancelled;
        order.updated_at = now;
        let order = order.clone();

        if order.side == OrderSide::Buy {
            // Recomputed from current terms, which a modify may have changed.
            let refund = self.config.pricing.order_cost(&order);
            self.balance.update_balance(&self.config.currency, refund);
        }

        info!("Cancelled order {}", order_id);
        self.commit(state, vec![EngineEvent::OrderCancelled { order: order.clone() }]);
        Ok(Some(order))
    }

    /// Change an open order in place.
    ///
    /// A buy is charged or refunded the difference between old and new cost.
    /// Returns `None` without touching anything if the order is not open.
    pub fn modify_order(
        &self,
        order_id: u64,
        request: ModifyOrderRequest,
    ) -> Result<Option<Order>, TradingError> {
        let mut state = self.lock()?;
        let now = self.clock.now_ms();
        let current = match state.orders.get(order_id) {
            Some(order) if order.status == OrderStatus::Open => order.clone(),
            _ => return Ok(None),
        };

        let mut updated = current.clone();
        if let Some(kind) = request.kind {
            updated.kind = kind;
        }
        if let Some(quantity) = request.quantity {
            updated.quantity = quantity;
        }
        if let Some(price) = request.price {
            updated.price = price;
        }
        if let Some(stop_price) = request.stop_price {
            updated.stop_price = Some(stop_price);
        }
        updated.updated_at = now;
        validate_terms(&updated)?;

        match updated.side {
            OrderSide::Sell => check_sell_cover(&state.positions, &updated)?,
            OrderSide::Buy => {
                let pricing = &self.config.pricing;
                let delta = pricing.order_cost(&updated) - pricing.order_cost(&current);
                if delta > 0.0 {
                    self.balance.try_debit(&self.config.currency, delta)?;
                } else if delta < 0.0 {
                    self.balance.update_balance(&self.config.currency, -delta);
                }
            }
        }

        state.orders.insert(updated.clone());
        info!("Modified order {}", order_id);

        let mut txn = self.txn(&mut state);
        txn.events.push(EngineEvent::OrderModified { order: updated });
        txn.evaluate(order_id);
        let events = std::mem::take(&mut txn.events);

        let modified = state.orders.get(order_id).cloned();
        self.commit(state, events);
        Ok(modified)
    }

    /// Fill a resting order at its own price. Filling twice is a no-op.
    pub fn fill_order(&self, order_id: u64) -> Result<Option<Order>, TradingError> {
        let mut state = self.lock()?;
        let mut txn = self.txn(&mut state);
        txn.fill(order_id);
        let events = std::mem::take(&mut txn.events);

        if events.is_empty() {
            return Ok(None);
        }
        let order = state.orders.get(order_id).cloned();
        self.commit(state, events);
        Ok(order)
    }

    // ==========================================================================
    // Price Updates
    // ==========================================================================

    /// Record a new market price and run the reactive pipeline:
    /// limit fills, stop triggers, limit fills for freshly promoted stop-limits,
    /// then position revaluation with liquidation, exercise and expiry.
    ///
    /// Returns every event the update caused, in order.
    pub fn set_market_price(
        &self,
        symbol: &str,
        price: f64,
    ) -> Result<Vec<EngineEvent>, TradingError> {
        let symbol = symbol.trim().to_uppercase();
        if !price.is_finite() || price <= 0.0 || symbol.is_empty() {
            warn!("Ignoring invalid price {} for {:?}", price, symbol);
            return Ok(Vec::new());
        }

        let mut state = self.lock()?;
        self.prices.set_price(&symbol, price);

        let mut txn = self.txn(&mut state);
        txn.events.push(EngineEvent::PriceUpdated { symbol: symbol.clone(), price });
        txn.sweep_limits(&symbol, price);
        txn.sweep_stops(&symbol, price);
        txn.sweep_limits(&symbol, price);
        txn.revalue_positions(&symbol, price);
        let events = std::mem::take(&mut txn.events);

        Ok(self.commit(state, events))
    }

    // ==========================================================================
    // Position Management
    // ==========================================================================

    /// Close a position in full at the current price.
    /// Returns `None` if the position does not exist.
    pub fn close_position(&self, position_id: u64) -> Result<Option<Trade>, TradingError> {
        let mut state = self.lock()?;
        let mut txn = self.txn(&mut state);
        let trade = txn.close(position_id);
        let events = std::mem::take(&mut txn.events);

        if trade.is_some() {
            self.commit(state, events);
        }
        Ok(trade)
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// All orders, most recent first.
    pub fn get_user_orders(&self) -> Result<Vec<Order>, TradingError> {
        Ok(self.lock()?.orders.list())
    }

    pub fn get_order(&self, order_id: u64) -> Result<Option<Order>, TradingError> {
        Ok(self.lock()?.orders.get(order_id).cloned())
    }

    /// Open positions, most recent first.
    pub fn get_user_positions(&self) -> Result<Vec<Position>, TradingError> {
        Ok(self.lock()?.positions.list())
    }

    pub fn get_position(&self, position_id: u64) -> Result<Option<Position>, TradingError> {
        Ok(self.lock()?.positions.get(position_id).cloned())
    }

    /// Trade history, most recent first.
    pub fn get_user_trades(&self) -> Result<Vec<Trade>, TradingError> {
        Ok(self.lock()?.trades.list())
    }

    pub fn list_trades(&self, filter: &TradeFilter) -> Result<Vec<Trade>, TradingError> {
        Ok(self.lock()?.trades.filter(filter))
    }

    pub fn trade_summary(&self, filter: &TradeFilter) -> Result<TradeSummary, TradingError> {
        Ok(self.lock()?.trades.summary(filter))
    }

    // ==========================================================================
    // Snapshots
    // ==========================================================================

    pub fn snapshot(&self) -> Result<EngineSnapshot, TradingError> {
        let state = self.lock()?;
        Ok(EngineSnapshot {
            orders: state.orders.clone(),
            positions: state.positions.clone(),
            trades: state.trades.clone(),
            prices: self.prices.snapshot(),
            taken_at: self.clock.now_ms(),
        })
    }

    /// Replace all state with a snapshot. Balances are not part of it.
    pub fn restore(&self, snapshot: EngineSnapshot) -> Result<(), TradingError> {
        let mut state = self.lock()?;
        for (symbol, price) in &snapshot.prices {
            self.prices.set_price(symbol, *price);
        }
        *state = EngineState {
            orders: snapshot.orders,
            positions: snapshot.positions,
            trades: snapshot.trades,
        };
        info!(
            "Restored {} orders, {} positions, {} trades",
            state.orders.len(),
            state.positions.len(),
            state.trades.len()
        );
        Ok(())
    }

    /// Restore from the attached snapshot store, if it holds anything.
    pub fn restore_from_store(&self) -> Result<bool, TradingError> {
        let Some(ref store) = self.snapshots else {
            return Ok(false);
        };
        match store.load()? {
            Some(snapshot) => {
                self.restore(snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Quantity, price and stop terms every order must satisfy.
fn validate_terms(order: &Order) -> Result<(), TradingError> {
    if !order.quantity.is_finite() || order.quantity <= 0.0 {
        return Err(TradingError::InvalidOrder("Quantity must be positive".to_string()));
    }
    if !order.price.is_finite() || order.price <= 0.0 {
        return Err(TradingError::InvalidOrder("Price must be positive".to_string()));
    }
    if order.kind.is_stop() {
        match order.stop_price {
            Some(stop) if stop.is_finite() && stop > 0.0 => {}
            _ => {
                return Err(TradingError::InvalidOrder(format!(
                    "{} order requires a positive stop_price",
                    order.kind
                )))
            }
        }
    }
    Ok(())
}

/// A sell must reference an existing position that holds enough.
fn check_sell_cover(positions: &PositionLedger, order: &Order) -> Result<(), TradingError> {
    let position = positions
        .find(&order.position_key())
        .ok_or_else(|| TradingError::NoMatchingPosition(order.symbol.clone()))?;
    if order.quantity > position.quantity + QUANTITY_EPSILON {
        return Err(TradingError::InsufficientQuantity {
            requested: order.quantity,
            available: position.quantity,
        });
    }
    Ok(())
}

/// One locked unit of work. Collects events in the order they happen.
struct Txn<'a> {
    service: &'a TradingService,
    state: &'a mut EngineState,
    events: Vec<EngineEvent>,
    now: i64,
}

impl Txn<'_> {
    fn pricing(&self) -> &PricingModel {
        &self.service.config.pricing
    }

    fn credit(&self, amount: f64) {
        self.service
            .balance
            .update_balance(&self.service.config.currency, amount);
    }

    /// Fill, trigger or leave a just placed or modified order.
    fn evaluate(&mut self, order_id: u64) {
        let Some(order) = self.state.orders.get(order_id).filter(|o| o.is_resting()).cloned() else {
            return;
        };
        let market_price = self.service.prices.get_price(&order.symbol);

        match order.kind {
            OrderKind::Market => self.fill(order_id),
            OrderKind::Limit => {
                if limit_fillable(&order, market_price) {
                    self.fill(order_id);
                }
            }
            OrderKind::StopLoss | OrderKind::StopLimit => {
                if stop_triggered(&order, market_price) {
                    self.trigger(order_id, market_price);
                }
            }
        }
    }

    fn sweep_limits(&mut self, symbol: &str, price: f64) {
        for id in self.state.orders.resting_ids(symbol) {
            let fillable = self
                .state
                .orders
                .get(id)
                .map(|o| limit_fillable(o, price))
                .unwrap_or(false);
            if fillable {
                self.fill(id);
            }
        }
    }

    fn sweep_stops(&mut self, symbol: &str, price: f64) {
        for id in self.state.orders.resting_ids(symbol) {
            let triggered = self
                .state
                .orders
                .get(id)
                .map(|o| o.status == OrderStatus::Open && stop_triggered(o, price))
                .unwrap_or(false);
            if triggered {
                self.trigger(id, price);
            }
        }
    }

    /// A stop-loss executes outright; a stop-limit becomes a resting limit
    /// and is checked against the limit predicate straight away.
    fn trigger(&mut self, order_id: u64, market_price: f64) {
        let Some(order) = self.state.orders.get_mut(order_id) else {
            return;
        };

        match order.kind {
            OrderKind::StopLoss => {
                info!("Stop-loss order {} triggered at {:.2}", order_id, market_price);
                self.fill(order_id);
            }
            OrderKind::StopLimit => {
                order.kind = OrderKind::Limit;
                order.status = OrderStatus::Triggered;
                order.updated_at = self.now;
                let promoted = order.clone();
                info!("Stop-limit order {} promoted to limit at {:.2}", order_id, market_price);
                self.events.push(EngineEvent::OrderTriggered { order: promoted.clone() });

                if limit_fillable(&promoted, market_price) {
                    self.fill(order_id);
                }
            }
            _ => {}
        }
    }

    fn fill(&mut self, order_id: u64) {
        let Some(order) = self.state.orders.get(order_id).filter(|o| o.is_resting()).cloned() else {
            return;
        };
        let market_price = self.service.prices.get_price(&order.symbol);

        match order.side {
            OrderSide::Buy => {
                // Cost was reserved at placement.
                let split = self.pricing().margin_split(&order);
                let outcome = self
                    .state
                    .positions
                    .apply_buy(&order, split, market_price, self.now);
                let filled = self.mark_filled(order_id).unwrap_or_else(|| order.clone());
                self.events.push(EngineEvent::OrderFilled { order: filled });

                let position = outcome.position().clone();
                self.record_trade(Trade {
                    id: 0,
                    order_id: Some(order.id),
                    position_id: Some(position.id),
                    symbol: order.symbol.clone(),
                    name: String::new(),
                    asset_type: catalog::asset_type(&order.symbol),
                    trading_type: order.trading_type,
                    kind: TradeKind::Fill,
                    side: OrderSide::Buy,
                    quantity: order.quantity,
                    entry_price: order.price,
                    exit_price: None,
                    pnl: 0.0,
                    status: TradeStatus::Open,
                    leverage: order.leverage,
                    timestamp: self.now,
                });

                info!(
                    "Filled buy order {} for {} x{} @ {:.2}",
                    order.id, order.symbol, order.quantity, order.price
                );
                self.events.push(match outcome {
                    FillOutcome::Opened(position) => EngineEvent::PositionOpened { position },
                    _ => EngineEvent::PositionUpdated { position: position.clone() },
                });

                // A fill above the market can land at or below the liquidation price.
                if self
                    .state
                    .positions
                    .get(position.id)
                    .is_some_and(|p| p.should_liquidate())
                {
                    self.liquidate(position.id);
                }
            }
            OrderSide::Sell => {
                let Some(outcome) =
                    self.state.positions.apply_sell(&order, market_price, self.now)
                else {
                    // The position closed or shrank while the order rested.
                    warn!("Sell order {} no longer covered by a position, cancelling", order.id);
                    if let Some(o) = self.state.orders.get_mut(order_id) {
                        o.status = OrderStatus::Cancelled;
                        o.updated_at = self.now;
                        let cancelled = o.clone();
                        self.events.push(EngineEvent::OrderCancelled { order: cancelled });
                    }
                    return;
                };

                let proceeds = self.pricing().sell_value(&order);
                self.credit(proceeds);
                let filled = self.mark_filled(order_id).unwrap_or_else(|| order.clone());
                self.events.push(EngineEvent::OrderFilled { order: filled });

                let position = outcome.position().clone();
                self.record_trade(Trade {
                    id: 0,
                    order_id: Some(order.id),
                    position_id: Some(position.id),
                    symbol: order.symbol.clone(),
                    name: String::new(),
                    asset_type: catalog::asset_type(&order.symbol),
                    trading_type: order.trading_type,
                    kind: TradeKind::Fill,
                    side: OrderSide::Sell,
                    quantity: order.quantity,
                    entry_price: position.avg_price,
                    exit_price: Some(order.price),
                    pnl: outcome.realized_pnl(),
                    status: TradeStatus::Closed,
                    leverage: order.leverage,
                    timestamp: self.now,
                });

                info!(
                    "Filled sell order {} for {} x{} @ {:.2}, credited {:.2}",
                    order.id, order.symbol, order.quantity, order.price, proceeds
                );
                self.events.push(match outcome {
                    FillOutcome::Closed { position, .. } => {
                        EngineEvent::PositionClosed { position }
                    }
                    _ => EngineEvent::PositionReduced { position },
                });
            }
        }
    }

    fn mark_filled(&mut self, order_id: u64) -> Option<Order> {
        let order = self.state.orders.get_mut(order_id)?;
        order.status = OrderStatus::Filled;
        order.updated_at = self.now;
        Some(order.clone())
    }

    /// Number the trade, backfill its display name and append it.
    fn record_trade(&mut self, mut trade: Trade) -> Trade {
        trade.id = self.state.trades.next_id();
        trade.name = catalog::display_name(&trade.symbol);
        self.state.trades.append(trade.clone());
        self.events.push(EngineEvent::TradeRecorded { trade: trade.clone() });
        trade
    }

    fn closing_trade(&self, position: &Position, kind: TradeKind, pnl: f64) -> Trade {
        Trade {
            id: 0,
            order_id: None,
            position_id: Some(position.id),
            symbol: position.symbol.clone(),
            name: String::new(),
            asset_type: catalog::asset_type(&position.symbol),
            trading_type: position.trading_type,
            kind,
            side: OrderSide::Sell,
            quantity: position.quantity,
            entry_price: position.avg_price,
            exit_price: Some(position.current_price),
            pnl,
            status: TradeStatus::Closed,
            leverage: position.leverage,
            timestamp: self.now,
        }
    }

    fn revalue_positions(&mut self, symbol: &str, price: f64) {
        let now = self.now;
        for id in self.state.positions.ids_for_symbol(symbol) {
            let Some(position) = self.state.positions.get_mut(id) else {
                continue;
            };
            position.update_price(price, now);

            if position.trading_type == TradingType::Options {
                if position.is_expired(now) {
                    if position.intrinsic_value.unwrap_or(0.0) > 0.0 {
                        self.exercise(id);
                    } else {
                        self.expire(id);
                    }
                    continue;
                }
            } else if position.should_liquidate() {
                self.liquidate(id);
                continue;
            }

            let position = position.clone();
            self.events.push(EngineEvent::PositionUpdated { position });
        }
    }

    /// Force-close a leveraged position. The margin is forfeited.
    fn liquidate(&mut self, position_id: u64) {
        let Some(position) = self.state.positions.remove(position_id) else {
            return;
        };
        warn!(
            "Liquidated position {} {} at {:.2}, margin lost {:.2}",
            position.id, position.symbol, position.current_price, position.margin_used
        );
        let trade = self.closing_trade(&position, TradeKind::Liquidation, -position.margin_used);
        self.record_trade(trade);
        self.events.push(EngineEvent::PositionLiquidated { position });
    }

    /// Pay out an in-the-money option at expiry.
    fn exercise(&mut self, position_id: u64) {
        let Some(position) = self.state.positions.remove(position_id) else {
            return;
        };
        let payout = position.intrinsic_value.unwrap_or(0.0) * position.quantity;
        self.credit(payout);
        info!(
            "Exercised option position {} {}, payout {:.2}",
            position.id, position.symbol, payout
        );
        let trade = self.closing_trade(&position, TradeKind::Exercise, position.pnl);
        self.record_trade(trade);
        self.events.push(EngineEvent::OptionExercised { position, payout });
    }

    /// Drop a worthless option at expiry. Nothing is credited.
    fn expire(&mut self, position_id: u64) {
        let Some(position) = self.state.positions.remove(position_id) else {
            return;
        };
        info!("Option position {} {} expired worthless", position.id, position.symbol);
        let lost = position.premium.unwrap_or(0.0) * position.quantity;
        let trade = self.closing_trade(&position, TradeKind::Expiry, -lost);
        self.record_trade(trade);
        self.events.push(EngineEvent::OptionExpired { position });
    }

    /// User-initiated full close at the current price.
    fn close(&mut self, position_id: u64) -> Option<Trade> {
        let market_price = {
            let position = self.state.positions.get(position_id)?;
            self.service.prices.get_price(&position.symbol)
        };
        let mut position = self.state.positions.remove(position_id)?;
        position.update_price(market_price, self.now);

        let value = position.close_value();
        self.credit(value);
        info!(
            "Closed position {} {} ({}), returned {:.2}",
            position.id, position.symbol, position.trading_type, value
        );
        let trade = self.closing_trade(&position, TradeKind::Close, position.pnl);
        let trade = self.record_trade(trade);
        self.events.push(EngineEvent::PositionClosed { position });
        Some(trade)
    }
}
