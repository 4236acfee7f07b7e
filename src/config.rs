use crate::services::pricing::{PricingModel, DEFAULT_MARGIN_LEVERAGE, DEFAULT_VOLATILITY};
use crate::services::{catalog, EngineConfig};
use std::env;

/// Simulated price feed configuration.
#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    /// Whether the random-walk feed runs.
    pub enabled: bool,
    /// Interval between ticks (ms).
    pub tick_ms: u64,
    /// Largest relative move per tick.
    pub max_step: f64,
    /// Symbols the feed moves.
    pub symbols: Vec<String>,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_ms: 2000,
            max_step: 0.01,
            symbols: catalog::INSTRUMENTS
                .iter()
                .map(|i| i.symbol.to_string())
                .collect(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Balance seeded into the wallet at startup.
    pub starting_balance: f64,
    /// Currency orders are paid from.
    pub balance_currency: String,
    /// Artificial delay applied to every trading request (ms).
    pub simulated_latency_ms: u64,
    /// Price for symbols with no recorded or catalog price.
    pub default_price: f64,
    /// Annualized volatility used for option time value.
    pub option_volatility: f64,
    /// Implied leverage of margin trading.
    pub margin_leverage: f64,
    /// SQLite snapshot database. Snapshots are kept in memory when unset.
    pub sqlite_path: Option<String>,
    pub price_feed: PriceFeedConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let feed_defaults = PriceFeedConfig::default();
        let price_feed = PriceFeedConfig {
            enabled: env::var("PRICE_SIMULATION")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "on"))
                .unwrap_or(false),
            tick_ms: env::var("PRICE_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(feed_defaults.tick_ms),
            max_step: env::var("PRICE_MAX_STEP")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|step| step.is_finite() && *step >= 0.0)
                .unwrap_or(feed_defaults.max_step),
            symbols: env::var("PRICE_SYMBOLS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|sym| sym.trim().to_uppercase())
                        .filter(|sym| !sym.is_empty())
                        .collect()
                })
                .unwrap_or(feed_defaults.symbols),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3002),
            starting_balance: env::var("STARTING_BALANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000.0),
            balance_currency: env::var("BALANCE_CURRENCY")
                .unwrap_or_else(|_| "networth".to_string()),
            simulated_latency_ms: env::var("SIMULATED_LATENCY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            default_price: env::var("DEFAULT_PRICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100.0),
            option_volatility: env::var("OPTION_VOLATILITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_VOLATILITY),
            margin_leverage: env::var("MARGIN_LEVERAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MARGIN_LEVERAGE),
            sqlite_path: env::var("SQLITE_PATH").ok().filter(|p| !p.is_empty()),
            price_feed,
        }
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            currency: self.balance_currency.clone(),
            default_price: self.default_price,
            pricing: PricingModel::new(self.option_volatility, self.margin_leverage),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            starting_balance: 10_000.0,
            balance_currency: "networth".to_string(),
            simulated_latency_ms: 0,
            default_price: 100.0,
            option_volatility: DEFAULT_VOLATILITY,
            margin_leverage: DEFAULT_MARGIN_LEVERAGE,
            sqlite_path: None,
            price_feed: PriceFeedConfig::default(),
        }
    }
}
