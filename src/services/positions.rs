//! Position Ledger
//!
//! Aggregated holdings keyed by (symbol, trading type, leverage, contract).
//! Buys average in, sells reduce, and a position whose quantity reaches zero
//! is removed rather than kept as an empty record.

use crate::services::pricing::MarginSplit;
use crate::types::{Order, Position, PositionKey, TradingType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quantities at or below this are treated as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Result of applying a fill to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Opened(Position),
    Increased(Position),
    Reduced { position: Position, realized_pnl: f64 },
    Closed { position: Position, realized_pnl: f64 },
}

impl FillOutcome {
    pub fn position(&self) -> &Position {
        match self {
            FillOutcome::Opened(p) | FillOutcome::Increased(p) => p,
            FillOutcome::Reduced { position, .. } | FillOutcome::Closed { position, .. } => {
                position
            }
        }
    }

    pub fn realized_pnl(&self) -> f64 {
        match self {
            FillOutcome::Reduced { realized_pnl, .. }
            | FillOutcome::Closed { realized_pnl, .. } => *realized_pnl,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionLedger {
    positions: BTreeMap<u64, Position>,
    next_id: u64,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            positions: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn get(&self, id: u64) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Position> {
        self.positions.get_mut(&id)
    }

    pub fn find(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.values().find(|p| p.matches(key))
    }

    pub fn remove(&mut self, id: u64) -> Option<Position> {
        self.positions.remove(&id)
    }

    /// Ids of positions in a symbol, oldest first.
    pub fn ids_for_symbol(&self, symbol: &str) -> Vec<u64> {
        self.positions
            .values()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.id)
            .collect()
    }

    /// All positions, most recent first.
    pub fn list(&self) -> Vec<Position> {
        self.positions.values().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Apply a buy fill: average into the matching position or open one.
    pub fn apply_buy(
        &mut self,
        order: &Order,
        split: MarginSplit,
        market_price: f64,
        now_ms: i64,
    ) -> FillOutcome {
        let key = order.position_key();
        let existing_id = self.find(&key).map(|p| p.id);

        if let Some(position) = existing_id.and_then(|id| self.positions.get_mut(&id)) {
            let total_qty = position.quantity + order.quantity;
            position.avg_price = (position.quantity * position.avg_price
                + order.quantity * order.price)
                / total_qty;
            if let (Some(old), Some(new)) = (position.premium, order.premium) {
                position.premium =
                    Some((position.quantity * old + order.quantity * new) / total_qty);
            }
            position.quantity = total_qty;
            position.margin_used += split.margin_used;
            if let Some(borrowed) = split.borrowed {
                position.borrowed_amount = Some(position.borrowed_amount.unwrap_or(0.0) + borrowed);
            }
            position.liquidation_price =
                liquidation_price(order.trading_type, position.avg_price, order.leverage);
            position.update_price(market_price, now_ms);
            return FillOutcome::Increased(position.clone());
        }

        let mut position = Position {
            id: self.next_id(),
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            avg_price: order.price,
            current_price: order.price,
            pnl: 0.0,
            pnl_percentage: 0.0,
            trading_type: order.trading_type,
            leverage: order.leverage,
            margin_used: split.margin_used,
            liquidation_price: liquidation_price(order.trading_type, order.price, order.leverage),
            borrowed_amount: split.borrowed,
            option: order.option,
            premium: order.premium,
            intrinsic_value: order.option.map(|c| c.intrinsic_value(market_price)),
            created_at: now_ms,
            updated_at: now_ms,
        };
        position.update_price(market_price, now_ms);
        self.positions.insert(position.id, position.clone());
        FillOutcome::Opened(position)
    }

    /// Apply a sell fill. Returns `None` when no position can cover it.
    pub fn apply_sell(
        &mut self,
        order: &Order,
        market_price: f64,
        now_ms: i64,
    ) -> Option<FillOutcome> {
        let key = order.position_key();
        let id = self.find(&key).map(|p| p.id)?;
        let position = self.positions.get_mut(&id)?;
        if order.quantity > position.quantity + QUANTITY_EPSILON {
            return None;
        }

        let realized_pnl = match (order.trading_type, order.premium, position.premium) {
            (TradingType::Options, Some(sold), Some(paid)) => (sold - paid) * order.quantity,
            (TradingType::Leverage, _, _) => {
                let leverage = position.leverage.unwrap_or(1.0);
                (order.price - position.avg_price) * order.quantity * leverage
            }
            _ => (order.price - position.avg_price) * order.quantity,
        };

        let ratio = (order.quantity / position.quantity).min(1.0);
        position.margin_used -= position.margin_used * ratio;
        if let Some(borrowed) = position.borrowed_amount {
            position.borrowed_amount = Some(borrowed - borrowed * ratio);
        }
        position.quantity -= order.quantity;

        if position.quantity <= QUANTITY_EPSILON {
            let position = self.positions.remove(&id)?;
            return Some(FillOutcome::Closed { position, realized_pnl });
        }

        position.update_price(market_price, now_ms);
        Some(FillOutcome::Reduced {
            position: position.clone(),
            realized_pnl,
        })
    }
}

fn liquidation_price(
    trading_type: TradingType,
    avg_price: f64,
    leverage: Option<f64>,
) -> Option<f64> {
    match (trading_type, leverage) {
        (TradingType::Leverage, Some(leverage)) => {
            Some(Position::liquidation_threshold(avg_price, leverage))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::PricingModel;
    use crate::types::{OrderKind, OrderSide, OrderStatus};

    fn order(side: OrderSide, quantity: f64, price: f64, trading_type: TradingType, leverage: Option<f64>) -> Order {
        Order {
            id: 1,
            symbol: "BTC".to_string(),
            kind: OrderKind::Market,
            side,
            quantity,
            price,
            stop_price: None,
            status: OrderStatus::Open,
            trading_type,
            leverage,
            option: None,
            premium: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn buy(ledger: &mut PositionLedger, o: &Order) -> FillOutcome {
        let split = PricingModel::default().margin_split(o);
        ledger.apply_buy(o, split, o.price, 0)
    }

    #[test]
    fn test_weighted_average_over_fills() {
        let mut ledger = PositionLedger::new();
        let fills = [(1.0, 100.0), (3.0, 120.0), (0.5, 90.0)];
        for (qty, price) in fills {
            buy(&mut ledger, &order(OrderSide::Buy, qty, price, TradingType::Spot, None));
        }

        let expected: f64 = fills.iter().map(|(q, p)| q * p).sum::<f64>()
            / fills.iter().map(|(q, _)| q).sum::<f64>();
        let positions = ledger.list();
        assert_eq!(positions.len(), 1);
        assert!((positions[0].avg_price - expected).abs() < 1e-9);
        assert!((positions[0].quantity - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_keys_do_not_merge_across_trading_types() {
        let mut ledger = PositionLedger::new();
        buy(&mut ledger, &order(OrderSide::Buy, 1.0, 100.0, TradingType::Spot, None));
        buy(&mut ledger, &order(OrderSide::Buy, 1.0, 100.0, TradingType::Leverage, Some(5.0)));
        buy(&mut ledger, &order(OrderSide::Buy, 1.0, 100.0, TradingType::Leverage, Some(10.0)));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_leverage_liquidation_price_tracks_average() {
        let mut ledger = PositionLedger::new();
        let outcome = buy(&mut ledger, &order(OrderSide::Buy, 1.0, 40_000.0, TradingType::Leverage, Some(5.0)));
        assert_eq!(outcome.position().liquidation_price, Some(32_000.0));
        assert_eq!(outcome.position().margin_used, 8_000.0);

        let outcome = buy(&mut ledger, &order(OrderSide::Buy, 1.0, 50_000.0, TradingType::Leverage, Some(5.0)));
        assert!(matches!(outcome, FillOutcome::Increased(_)));
        assert_eq!(outcome.position().liquidation_price, Some(36_000.0));
        assert_eq!(outcome.position().margin_used, 18_000.0);
    }

    #[test]
    fn test_sell_reduces_then_removes() {
        let mut ledger = PositionLedger::new();
        buy(&mut ledger, &order(OrderSide::Buy, 2.0, 100.0, TradingType::Margin, None));

        let outcome = ledger
            .apply_sell(&order(OrderSide::Sell, 0.5, 110.0, TradingType::Margin, None), 110.0, 0)
            .unwrap();
        match outcome {
            FillOutcome::Reduced { position, realized_pnl } => {
                assert_eq!(position.quantity, 1.5);
                assert_eq!(realized_pnl, 5.0);
                assert_eq!(position.margin_used, 75.0);
                assert_eq!(position.borrowed_amount, Some(75.0));
            }
            other => panic!("expected reduction, got {:?}", other),
        }

        let outcome = ledger
            .apply_sell(&order(OrderSide::Sell, 1.5, 90.0, TradingType::Margin, None), 90.0, 0)
            .unwrap();
        assert!(matches!(outcome, FillOutcome::Closed { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_sell_without_cover_is_rejected() {
        let mut ledger = PositionLedger::new();
        assert!(ledger
            .apply_sell(&order(OrderSide::Sell, 1.0, 1.0, TradingType::Spot, None), 1.0, 0)
            .is_none());

        buy(&mut ledger, &order(OrderSide::Buy, 1.0, 100.0, TradingType::Spot, None));
        assert!(ledger
            .apply_sell(&order(OrderSide::Sell, 2.0, 1.0, TradingType::Spot, None), 1.0, 0)
            .is_none());
        assert_eq!(ledger.list()[0].quantity, 1.0);
    }
}
