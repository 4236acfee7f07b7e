use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    open_positions: usize,
    priced_symbols: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // A poisoned engine lock still answers, but flags the service.
    let (status, open_positions) = match state.trading.get_user_positions() {
        Ok(positions) => ("ok", positions.len()),
        Err(_) => ("degraded", 0),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        open_positions,
        priced_symbols: state.trading.price_store().symbols().len(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::balance::InMemoryBalance;
    use crate::services::TradingService;
    use std::sync::Arc;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "1.0.0",
            open_positions: 2,
            priced_symbols: 1,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"version\":\"1.0.0\""));
        assert!(json.contains("\"openPositions\":2"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let config = Config::default();
        let trading = Arc::new(TradingService::new(
            config.engine_config(),
            Arc::new(InMemoryBalance::new()),
        ));
        trading.set_market_price("BTC", 40_000.0).unwrap();
        let state = AppState {
            config: Arc::new(config),
            trading,
        };

        let Json(response) = health(State(state)).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.open_positions, 0);
        assert_eq!(response.priced_symbols, 1);
    }
}
