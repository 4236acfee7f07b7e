use dione::config::Config;
use dione::services::{
    BalanceService, InMemoryBalance, MemorySnapshotStore, PriceFeed, SnapshotStore,
    SqliteSnapshotStore, TradingService,
};
use dione::{AppState, EngineEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dione=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Dione server on {}:{}", config.host, config.port);

    // Seed the wallet
    let wallet = Arc::new(InMemoryBalance::new());
    wallet.update_balance(&config.balance_currency, config.starting_balance);

    // Snapshot persistence
    let snapshots: Arc<dyn SnapshotStore> = match config.sqlite_path {
        Some(ref path) => {
            info!("Persisting engine snapshots to {}", path);
            Arc::new(SqliteSnapshotStore::new(path)?)
        }
        None => {
            debug!("SQLITE_PATH unset, keeping snapshots in memory");
            Arc::new(MemorySnapshotStore::new())
        }
    };

    let trading = Arc::new(
        TradingService::new(config.engine_config(), wallet).with_snapshot_store(snapshots),
    );
    match trading.restore_from_store() {
        Ok(true) => info!("Restored engine state from snapshot"),
        Ok(false) => debug!("No snapshot found, starting empty"),
        Err(e) => warn!("Failed to restore engine state: {}", e),
    }

    // Audit forced closes
    {
        let mut events = trading.subscribe_events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(
                        event @ (EngineEvent::PositionLiquidated { .. }
                        | EngineEvent::OptionExercised { .. }
                        | EngineEvent::OptionExpired { .. }),
                    ) => info!(
                        "{}: {}",
                        event.name(),
                        serde_json::to_string(&event).unwrap_or_default()
                    ),
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event logger lagged by {} events", n)
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // Start the simulated price feed
    if config.price_feed.enabled {
        PriceFeed::new(
            trading.clone(),
            config.price_feed.symbols.clone(),
            Duration::from_millis(config.price_feed.tick_ms),
        )
        .with_max_step(config.price_feed.max_step)
        .spawn();
    }

    let state = AppState {
        config: config.clone(),
        trading,
    };
    let app = dione::app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Dione server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
