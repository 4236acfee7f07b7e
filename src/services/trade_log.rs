use crate::types::{Trade, TradeFilter, TradeStatus, TradeSummary};
use serde::{Deserialize, Serialize};

/// Append-only record of fills, closes, liquidations, exercises and expiries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLog {
    trades: Vec<Trade>,
    next_id: u64,
}

impl TradeLog {
    pub fn new() -> Self {
        Self {
            trades: Vec::new(),
            next_id: 1,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// All trades, most recent first.
    pub fn list(&self) -> Vec<Trade> {
        self.trades.iter().rev().cloned().collect()
    }

    pub fn filter(&self, filter: &TradeFilter) -> Vec<Trade> {
        self.trades
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    /// Realized results over closed trades matching the filter.
    pub fn summary(&self, filter: &TradeFilter) -> TradeSummary {
        self.trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed && filter.matches(t))
            .fold(TradeSummary::default(), |mut acc, t| {
                acc.count += 1;
                acc.realized_pnl += t.pnl;
                if t.pnl > 0.0 {
                    acc.wins += 1;
                } else if t.pnl < 0.0 {
                    acc.losses += 1;
                }
                acc
            })
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetType, OrderSide, TradeKind, TradingType};

    fn trade(id: u64, status: TradeStatus, trading_type: TradingType, pnl: f64) -> Trade {
        Trade {
            id,
            order_id: None,
            position_id: None,
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            asset_type: AssetType::Crypto,
            trading_type,
            kind: TradeKind::Fill,
            side: OrderSide::Buy,
            quantity: 1.0,
            entry_price: 1.0,
            exit_price: None,
            pnl,
            status,
            leverage: None,
            timestamp: id as i64,
        }
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let mut log = TradeLog::new();
        for _ in 0..3 {
            let id = log.next_id();
            log.append(trade(id, TradeStatus::Open, TradingType::Spot, 0.0));
        }
        let ids: Vec<u64> = log.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_filter_and_summary() {
        let mut log = TradeLog::new();
        log.append(trade(1, TradeStatus::Open, TradingType::Spot, 0.0));
        log.append(trade(2, TradeStatus::Closed, TradingType::Spot, 50.0));
        log.append(trade(3, TradeStatus::Closed, TradingType::Leverage, -8_000.0));
        log.append(trade(4, TradeStatus::Closed, TradingType::Spot, -10.0));

        let closed_spot = TradeFilter {
            status: Some(TradeStatus::Closed),
            trading_type: Some(TradingType::Spot),
        };
        let ids: Vec<u64> = log.filter(&closed_spot).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 2]);

        let summary = log.summary(&TradeFilter::default());
        assert_eq!(summary.count, 3);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 2);
        assert_eq!(summary.realized_pnl, -7_960.0);
    }
}
