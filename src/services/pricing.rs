//! Pricing Model
//!
//! Cost and premium formulas shared by placement, cancellation, modification
//! and fills:
//! - spot: `quantity * price`
//! - margin: `quantity * price / margin_leverage` (the rest is borrowed)
//! - leverage: `quantity * price / leverage`
//! - options: `premium * quantity`
//!
//! The option premium is intrinsic value plus a volatility-scaled time value,
//! `spot * volatility * sqrt(days / 365) / 4`. It is a simplified approximation
//! good enough for a simulator, not an options pricing model.

use crate::types::{OptionContract, Order, TradingType};

/// Default annualized volatility used for time value.
pub const DEFAULT_VOLATILITY: f64 = 0.30;

/// Implied leverage of margin trading.
pub const DEFAULT_MARGIN_LEVERAGE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingModel {
    pub volatility: f64,
    pub margin_leverage: f64,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self {
            volatility: DEFAULT_VOLATILITY,
            margin_leverage: DEFAULT_MARGIN_LEVERAGE,
        }
    }
}

/// Funds an order commits and, for margin, the amount borrowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginSplit {
    pub margin_used: f64,
    pub borrowed: Option<f64>,
}

impl PricingModel {
    pub fn new(volatility: f64, margin_leverage: f64) -> Self {
        Self {
            volatility,
            margin_leverage,
        }
    }

    pub fn time_value(&self, spot: f64, days_to_expiration: f64) -> f64 {
        spot * self.volatility * (days_to_expiration / 365.0).sqrt() / 4.0
    }

    /// Premium per contract at the given spot price.
    pub fn option_premium(&self, contract: &OptionContract, spot: f64, now_ms: i64) -> f64 {
        contract.intrinsic_value(spot)
            + self.time_value(spot, contract.days_to_expiration(now_ms))
    }

    /// Funds a buy of this order reserves.
    pub fn order_cost(&self, order: &Order) -> f64 {
        let notional = order.quantity * order.price;
        match order.trading_type {
            TradingType::Spot => notional,
            TradingType::Margin => notional / self.margin_leverage,
            TradingType::Leverage => notional / order.leverage.unwrap_or(1.0),
            TradingType::Options => order.premium.unwrap_or(0.0) * order.quantity,
        }
    }

    /// Split a fill into committed margin and borrowed funds.
    pub fn margin_split(&self, order: &Order) -> MarginSplit {
        let margin_used = self.order_cost(order);
        let borrowed = match order.trading_type {
            TradingType::Margin => Some(order.quantity * order.price - margin_used),
            _ => None,
        };
        MarginSplit {
            margin_used,
            borrowed,
        }
    }

    /// What a sell fill credits back.
    pub fn sell_value(&self, order: &Order) -> f64 {
        match order.trading_type {
            TradingType::Options => order.premium.unwrap_or(0.0) * order.quantity,
            _ => order.quantity * order.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OptionType, OrderKind, OrderSide, OrderStatus};

    fn order(trading_type: TradingType, leverage: Option<f64>, premium: Option<f64>) -> Order {
        Order {
            id: 1,
            symbol: "BTC".to_string(),
            kind: OrderKind::Market,
            side: OrderSide::Buy,
            quantity: 2.0,
            price: 1_000.0,
            stop_price: None,
            status: OrderStatus::Open,
            trading_type,
            leverage,
            option: None,
            premium,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_order_cost_per_trading_type() {
        let model = PricingModel::default();
        assert_eq!(model.order_cost(&order(TradingType::Spot, None, None)), 2_000.0);
        assert_eq!(model.order_cost(&order(TradingType::Margin, None, None)), 1_000.0);
        assert_eq!(model.order_cost(&order(TradingType::Leverage, Some(5.0), None)), 400.0);
        assert_eq!(model.order_cost(&order(TradingType::Options, None, Some(12.5))), 25.0);
    }

    #[test]
    fn test_margin_split_borrows_the_rest() {
        let model = PricingModel::default();
        let split = model.margin_split(&order(TradingType::Margin, None, None));
        assert_eq!(split.margin_used, 1_000.0);
        assert_eq!(split.borrowed, Some(1_000.0));

        let split = model.margin_split(&order(TradingType::Leverage, Some(4.0), None));
        assert_eq!(split.margin_used, 500.0);
        assert_eq!(split.borrowed, None);
    }

    #[test]
    fn test_option_premium_at_expiry_is_intrinsic() {
        let model = PricingModel::default();
        let contract = OptionContract {
            strike: 100.0,
            option_type: OptionType::Call,
            expiration: 0,
        };
        assert_eq!(model.option_premium(&contract, 110.0, 10), 10.0);
    }

    #[test]
    fn test_time_value_one_year() {
        let model = PricingModel::default();
        // 100 * 0.30 * 1 / 4
        assert!((model.time_value(100.0, 365.0) - 7.5).abs() < 1e-9);
        assert_eq!(model.time_value(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_sell_value() {
        let model = PricingModel::default();
        let mut sell = order(TradingType::Margin, None, None);
        sell.side = OrderSide::Sell;
        assert_eq!(model.sell_value(&sell), 2_000.0);
        assert_eq!(model.sell_value(&order(TradingType::Options, None, Some(3.0))), 6.0);
    }
}
