//! Simulated Price Feed
//!
//! Random-walk price source for running the engine without a market data
//! connection. Each tick moves every configured symbol by a bounded random
//! percentage and pushes the new price through the engine.

use crate::services::TradingService;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Largest move per tick, as a fraction of the price.
pub const DEFAULT_MAX_STEP: f64 = 0.01;

pub struct PriceFeed {
    trading: Arc<TradingService>,
    symbols: Vec<String>,
    tick: Duration,
    max_step: f64,
}

impl PriceFeed {
    pub fn new(trading: Arc<TradingService>, symbols: Vec<String>, tick: Duration) -> Self {
        Self {
            trading,
            symbols,
            tick,
            max_step: DEFAULT_MAX_STEP,
        }
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        if max_step.is_finite() && max_step >= 0.0 {
            self.max_step = max_step;
        } else {
            warn!("Ignoring invalid price step {}, keeping {}", max_step, self.max_step);
        }
        self
    }

    /// Move every symbol once. Returns the number of engine events caused.
    pub fn step<R: Rng>(&self, rng: &mut R) -> usize {
        let mut events = 0;
        for symbol in &self.symbols {
            let price = next_price(rng, self.trading.get_price(symbol), self.max_step);
            match self.trading.set_market_price(symbol, price) {
                Ok(caused) => events += caused.len(),
                Err(e) => warn!("Price feed update for {} failed: {}", symbol, e),
            }
        }
        events
    }

    /// Run the feed on the tokio runtime until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Starting simulated price feed for {} symbols every {:?}",
            self.symbols.len(),
            self.tick
        );
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut interval = tokio::time::interval(self.tick);
            loop {
                interval.tick().await;
                let events = self.step(&mut rng);
                debug!("Price feed tick produced {} events", events);
            }
        })
    }
}

/// One random-walk step, never reaching zero.
pub fn next_price<R: Rng>(rng: &mut R, price: f64, max_step: f64) -> f64 {
    if !max_step.is_finite() || max_step <= 0.0 {
        return price;
    }
    let change = rng.gen_range(-max_step..max_step);
    (price * (1.0 + change)).max(f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::balance::InMemoryBalance;
    use crate::services::trading::EngineConfig;

    #[test]
    fn test_next_price_stays_within_step() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let price = next_price(&mut rng, 100.0, 0.02);
            assert!((98.0..=102.0).contains(&price));
        }
        assert_eq!(next_price(&mut rng, 100.0, 0.0), 100.0);
    }

    #[test]
    fn test_non_finite_step_leaves_price_alone() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(next_price(&mut rng, 100.0, f64::NAN), 100.0);
        assert_eq!(next_price(&mut rng, 100.0, f64::INFINITY), 100.0);
    }

    #[test]
    fn test_with_max_step_rejects_non_finite() {
        let wallet = Arc::new(InMemoryBalance::new());
        let trading = Arc::new(TradingService::new(EngineConfig::default(), wallet));
        let feed = PriceFeed::new(trading, vec!["BTC".to_string()], Duration::from_millis(10))
            .with_max_step(f64::NAN)
            .with_max_step(f64::INFINITY);
        assert_eq!(feed.max_step, DEFAULT_MAX_STEP);

        let feed = feed.with_max_step(0.05);
        assert_eq!(feed.max_step, 0.05);
    }

    #[test]
    fn test_step_updates_every_symbol() {
        let wallet = Arc::new(InMemoryBalance::new());
        let trading = Arc::new(TradingService::new(EngineConfig::default(), wallet));
        let feed = PriceFeed::new(
            trading.clone(),
            vec!["BTC".to_string(), "AAPL".to_string()],
            Duration::from_millis(10),
        );

        let mut rng = StdRng::seed_from_u64(42);
        let events = feed.step(&mut rng);

        assert_eq!(events, 2);
        assert_eq!(
            trading.price_store().symbols(),
            vec!["AAPL".to_string(), "BTC".to_string()]
        );
    }
}
