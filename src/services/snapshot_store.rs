//! Snapshot persistence for engine state.
//!
//! The engine keeps its collections in memory. A snapshot store is the one
//! serialization boundary: it receives the whole state after each mutation
//! and hands back the most recent one on startup.

use crate::services::order_book::OrderBook;
use crate::services::positions::PositionLedger;
use crate::services::trade_log::TradeLog;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot store lock poisoned")]
    Poisoned,
}

/// Full engine state at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub orders: OrderBook,
    pub positions: PositionLedger,
    pub trades: TradeLog,
    /// Explicitly set market prices
    #[serde(default)]
    pub prices: Vec<(String, f64)>,
    /// When the snapshot was taken (ms)
    pub taken_at: i64,
}

pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), SnapshotError>;
    fn load(&self) -> Result<Option<EngineSnapshot>, SnapshotError>;
}

/// Keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    latest: Mutex<Option<EngineSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), SnapshotError> {
        let mut latest = self.latest.lock().map_err(|_| SnapshotError::Poisoned)?;
        *latest = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<EngineSnapshot>, SnapshotError> {
        let latest = self.latest.lock().map_err(|_| SnapshotError::Poisoned)?;
        Ok(latest.clone())
    }
}

/// SQLite-backed store keeping a bounded history of JSON snapshots.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    keep: usize,
}

impl SqliteSnapshotStore {
    /// Open or create a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            keep: 20,
        };
        store.init_schema()?;
        info!("SQLite snapshot store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, SnapshotError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            keep: 20,
        };
        store.init_schema()?;
        debug!("In-memory SQLite snapshot store initialized");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), SnapshotError> {
        let conn = self.conn.lock().map_err(|_| SnapshotError::Poisoned)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                taken_at INTEGER NOT NULL,
                state_json TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn snapshot_count(&self) -> Result<usize, SnapshotError> {
        let conn = self.conn.lock().map_err(|_| SnapshotError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), SnapshotError> {
        let state_json = serde_json::to_string(snapshot)?;
        let conn = self.conn.lock().map_err(|_| SnapshotError::Poisoned)?;
        conn.execute(
            "INSERT INTO snapshots (taken_at, state_json) VALUES (?1, ?2)",
            params![snapshot.taken_at, state_json],
        )?;
        conn.execute(
            "DELETE FROM snapshots WHERE id NOT IN
             (SELECT id FROM snapshots ORDER BY id DESC LIMIT ?1)",
            params![self.keep as i64],
        )?;
        Ok(())
    }

    fn load(&self) -> Result<Option<EngineSnapshot>, SnapshotError> {
        let conn = self.conn.lock().map_err(|_| SnapshotError::Poisoned)?;
        let result = conn.query_row(
            "SELECT state_json FROM snapshots ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(taken_at: i64) -> EngineSnapshot {
        EngineSnapshot {
            prices: vec![("BTC".to_string(), 40_000.0)],
            taken_at,
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&snapshot(5)).unwrap();
        assert_eq!(store.load().unwrap().map(|s| s.taken_at), Some(5));
    }

    #[test]
    fn test_sqlite_store_returns_latest_and_prunes() {
        let store = SqliteSnapshotStore::new_in_memory().unwrap();
        assert!(store.load().unwrap().is_none());

        for i in 0..25 {
            store.save(&snapshot(i)).unwrap();
        }

        let latest = store.load().unwrap().unwrap();
        assert_eq!(latest.taken_at, 24);
        assert_eq!(latest.prices, vec![("BTC".to_string(), 40_000.0)]);
        assert_eq!(store.snapshot_count().unwrap(), 20);
    }
}
