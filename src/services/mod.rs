pub mod balance;
pub mod catalog;
pub mod clock;
pub mod order_book;
pub mod positions;
pub mod price_feed;
pub mod price_store;
pub mod pricing;
pub mod snapshot_store;
pub mod trade_log;
pub mod trading;

pub use balance::{BalanceError, BalanceService, InMemoryBalance};
pub use clock::{Clock, ManualClock, SystemClock};
pub use order_book::OrderBook;
pub use positions::{FillOutcome, PositionLedger};
pub use price_feed::PriceFeed;
pub use price_store::MarketPriceStore;
pub use pricing::PricingModel;
pub use snapshot_store::{
    EngineSnapshot, MemorySnapshotStore, SnapshotError, SnapshotStore, SqliteSnapshotStore,
};
pub use trade_log::TradeLog;
pub use trading::{EngineConfig, TradingError, TradingService};
