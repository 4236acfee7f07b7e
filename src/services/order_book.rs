//! Per-user book of resting orders and the fill/trigger predicates.

use crate::types::{Order, OrderKind, OrderSide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Orders keyed by id. Ids are assigned in increasing order, so iteration
/// order is insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    orders: BTreeMap<u64, Order>,
    next_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            orders: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn insert(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: u64) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// Ids of resting orders for a symbol, oldest first.
    pub fn resting_ids(&self, symbol: &str) -> Vec<u64> {
        self.orders
            .values()
            .filter(|o| o.symbol == symbol && o.is_resting())
            .map(|o| o.id)
            .collect()
    }

    /// All orders, most recent first.
    pub fn list(&self) -> Vec<Order> {
        self.orders.values().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// A limit buy fills at or below its price, a limit sell at or above.
pub fn limit_fillable(order: &Order, market_price: f64) -> bool {
    if order.kind != OrderKind::Limit {
        return false;
    }
    match order.side {
        OrderSide::Buy => market_price <= order.price,
        OrderSide::Sell => market_price >= order.price,
    }
}

/// A buy stop triggers at or above its stop, a sell stop at or below.
pub fn stop_triggered(order: &Order, market_price: f64) -> bool {
    if !order.kind.is_stop() {
        return false;
    }
    match (order.stop_price, order.side) {
        (Some(stop), OrderSide::Buy) => market_price >= stop,
        (Some(stop), OrderSide::Sell) => market_price <= stop,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderStatus, TradingType};

    fn order(id: u64, kind: OrderKind, side: OrderSide, price: f64, stop: Option<f64>) -> Order {
        Order {
            id,
            symbol: "AAPL".to_string(),
            kind,
            side,
            quantity: 1.0,
            price,
            stop_price: stop,
            status: OrderStatus::Open,
            trading_type: TradingType::Spot,
            leverage: None,
            option: None,
            premium: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_limit_predicates_are_inclusive() {
        let buy = order(1, OrderKind::Limit, OrderSide::Buy, 180.0, None);
        assert!(limit_fillable(&buy, 180.0));
        assert!(limit_fillable(&buy, 179.0));
        assert!(!limit_fillable(&buy, 180.01));

        let sell = order(2, OrderKind::Limit, OrderSide::Sell, 200.0, None);
        assert!(limit_fillable(&sell, 200.0));
        assert!(!limit_fillable(&sell, 199.99));
    }

    #[test]
    fn test_stop_predicates() {
        let sell = order(1, OrderKind::StopLoss, OrderSide::Sell, 90.0, Some(90.0));
        assert!(stop_triggered(&sell, 90.0));
        assert!(!stop_triggered(&sell, 91.0));

        let buy = order(2, OrderKind::StopLimit, OrderSide::Buy, 112.0, Some(110.0));
        assert!(stop_triggered(&buy, 110.0));
        assert!(!stop_triggered(&buy, 109.0));
        // A stop-limit is never filled by the limit predicate before promotion.
        assert!(!limit_fillable(&buy, 100.0));
    }

    #[test]
    fn test_resting_ids_in_insertion_order() {
        let mut book = OrderBook::new();
        for _ in 0..3 {
            let id = book.next_id();
            book.insert(order(id, OrderKind::Limit, OrderSide::Buy, 1.0, None));
        }
        if let Some(o) = book.get_mut(2) {
            o.status = OrderStatus::Cancelled;
        }
        assert_eq!(book.resting_ids("AAPL"), vec![1, 3]);
        assert_eq!(book.list().first().map(|o| o.id), Some(3));
    }
}
