//! Balance Ledger
//!
//! One scalar balance per currency, shared between the trading engine and
//! any other subsystem that spends from the same wallet.

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    #[error("Insufficient balance: need {needed}, have {available}")]
    Insufficient { needed: f64, available: f64 },
}

/// Shared wallet.
pub trait BalanceService: Send + Sync {
    /// Current balance, zero for an unknown currency.
    fn get_balance(&self, currency: &str) -> f64;

    /// Apply a signed delta unconditionally and return the new balance.
    fn update_balance(&self, currency: &str, delta: f64) -> f64;

    /// Debit `amount` only if the balance covers it. The check and the write
    /// happen under one lock.
    fn try_debit(&self, currency: &str, amount: f64) -> Result<f64, BalanceError>;
}

/// In-process wallet backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBalance {
    balances: DashMap<String, f64>,
}

impl InMemoryBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a wallet holding `amount` of `currency`.
    pub fn with_balance(currency: &str, amount: f64) -> Self {
        let ledger = Self::new();
        ledger.balances.insert(currency.to_string(), amount);
        ledger
    }
}

impl BalanceService for InMemoryBalance {
    fn get_balance(&self, currency: &str) -> f64 {
        self.balances.get(currency).map(|b| *b).unwrap_or(0.0)
    }

    fn update_balance(&self, currency: &str, delta: f64) -> f64 {
        let mut entry = self.balances.entry(currency.to_string()).or_insert(0.0);
        *entry += delta;
        debug!("Balance {} {:+.2} -> {:.2}", currency, delta, *entry);
        *entry
    }

    fn try_debit(&self, currency: &str, amount: f64) -> Result<f64, BalanceError> {
        let mut entry = self.balances.entry(currency.to_string()).or_insert(0.0);
        if amount > *entry {
            return Err(BalanceError::Insufficient {
                needed: amount,
                available: *entry,
            });
        }
        *entry -= amount;
        debug!("Balance {} -{:.2} -> {:.2}", currency, amount, *entry);
        Ok(*entry)
    }
}
