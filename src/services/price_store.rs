use crate::services::catalog;
use dashmap::DashMap;

/// Last known price per symbol.
///
/// Unknown symbols resolve to their catalog seed price, or to the configured
/// default when the catalog has no entry.
pub struct MarketPriceStore {
    prices: DashMap<String, f64>,
    default_price: f64,
}

impl MarketPriceStore {
    pub fn new(default_price: f64) -> Self {
        Self {
            prices: DashMap::new(),
            default_price,
        }
    }

    pub fn get_price(&self, symbol: &str) -> f64 {
        let key = symbol.to_uppercase();
        if let Some(price) = self.prices.get(&key) {
            return *price;
        }
        catalog::seed_price(&key).unwrap_or(self.default_price)
    }

    /// Record a price. Returns the previous explicit price, if any.
    pub fn set_price(&self, symbol: &str, price: f64) -> Option<f64> {
        self.prices.insert(symbol.to_uppercase(), price)
    }

    /// Symbols with an explicitly recorded price.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.prices.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn snapshot(&self) -> Vec<(String, f64)> {
        let mut prices: Vec<(String, f64)> = self
            .prices
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        prices.sort_by(|a, b| a.0.cmp(&b.0));
        prices
    }
}
