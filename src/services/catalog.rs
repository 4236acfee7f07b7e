//! Static instrument catalog: display names, classification and seed prices.

use crate::types::AssetType;

/// A tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instrument {
    pub symbol: &'static str,
    pub name: &'static str,
    pub asset_type: AssetType,
    pub seed_price: f64,
}

pub const INSTRUMENTS: &[Instrument] = &[
    Instrument { symbol: "BTC", name: "Bitcoin", asset_type: AssetType::Crypto, seed_price: 43_250.0 },
    Instrument { symbol: "ETH", name: "Ethereum", asset_type: AssetType::Crypto, seed_price: 2_280.0 },
    Instrument { symbol: "SOL", name: "Solana", asset_type: AssetType::Crypto, seed_price: 98.5 },
    Instrument { symbol: "AAPL", name: "Apple Inc.", asset_type: AssetType::Stock, seed_price: 185.0 },
    Instrument { symbol: "TSLA", name: "Tesla, Inc.", asset_type: AssetType::Stock, seed_price: 245.0 },
    Instrument { symbol: "NVDA", name: "NVIDIA Corporation", asset_type: AssetType::Stock, seed_price: 495.0 },
    Instrument { symbol: "MSFT", name: "Microsoft Corporation", asset_type: AssetType::Stock, seed_price: 375.0 },
    Instrument { symbol: "GOOGL", name: "Alphabet Inc.", asset_type: AssetType::Stock, seed_price: 140.0 },
    Instrument { symbol: "AMZN", name: "Amazon.com, Inc.", asset_type: AssetType::Stock, seed_price: 155.0 },
    Instrument { symbol: "SPY", name: "SPDR S&P 500 ETF Trust", asset_type: AssetType::Etf, seed_price: 475.0 },
];

/// Look up a known instrument (case-insensitive).
pub fn lookup(symbol: &str) -> Option<&'static Instrument> {
    INSTRUMENTS
        .iter()
        .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
}

/// Display name, falling back to the upper-cased symbol.
pub fn display_name(symbol: &str) -> String {
    lookup(symbol)
        .map(|i| i.name.to_string())
        .unwrap_or_else(|| symbol.to_uppercase())
}

/// Classify a symbol. Unknown 3-4 letter tickers are treated as crypto.
pub fn asset_type(symbol: &str) -> AssetType {
    if let Some(instrument) = lookup(symbol) {
        return instrument.asset_type;
    }
    if (3..=4).contains(&symbol.len()) && symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        AssetType::Crypto
    } else {
        AssetType::Stock
    }
}

/// Seed price for a known symbol.
pub fn seed_price(symbol: &str) -> Option<f64> {
    lookup(symbol).map(|i| i.seed_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("btc").map(|i| i.symbol), Some("BTC"));
        assert_eq!(seed_price("AAPL"), Some(185.0));
        assert!(lookup("NOPE").is_none());
    }

    #[test]
    fn test_classification() {
        assert_eq!(asset_type("SPY"), AssetType::Etf);
        assert_eq!(asset_type("TSLA"), AssetType::Stock);
        assert_eq!(asset_type("DOGE"), AssetType::Crypto);
        assert_eq!(asset_type("BRK.B"), AssetType::Stock);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name("eth"), "Ethereum");
        assert_eq!(display_name("xyz"), "XYZ");
    }
}
