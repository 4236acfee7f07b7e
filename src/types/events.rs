//! Engine events published as state changes happen.

use super::trading::{Order, Position, Trade};
use serde::Serialize;

/// Domain event emitted by the trading engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    PriceUpdated { symbol: String, price: f64 },
    OrderPlaced { order: Order },
    OrderModified { order: Order },
    /// A stop-limit crossed its stop and now rests as a limit order
    OrderTriggered { order: Order },
    OrderFilled { order: Order },
    OrderCancelled { order: Order },
    PositionOpened { position: Position },
    PositionUpdated { position: Position },
    PositionReduced { position: Position },
    PositionClosed { position: Position },
    PositionLiquidated { position: Position },
    OptionExercised { position: Position, payout: f64 },
    OptionExpired { position: Position },
    TradeRecorded { trade: Trade },
}

impl EngineEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::PriceUpdated { .. } => "price_updated",
            EngineEvent::OrderPlaced { .. } => "order_placed",
            EngineEvent::OrderModified { .. } => "order_modified",
            EngineEvent::OrderTriggered { .. } => "order_triggered",
            EngineEvent::OrderFilled { .. } => "order_filled",
            EngineEvent::OrderCancelled { .. } => "order_cancelled",
            EngineEvent::PositionOpened { .. } => "position_opened",
            EngineEvent::PositionUpdated { .. } => "position_updated",
            EngineEvent::PositionReduced { .. } => "position_reduced",
            EngineEvent::PositionClosed { .. } => "position_closed",
            EngineEvent::PositionLiquidated { .. } => "position_liquidated",
            EngineEvent::OptionExercised { .. } => "option_exercised",
            EngineEvent::OptionExpired { .. } => "option_expired",
            EngineEvent::TradeRecorded { .. } => "trade_recorded",
        }
    }
}
