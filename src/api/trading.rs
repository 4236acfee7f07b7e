//! Trading API
//!
//! Endpoints for the paper trading engine:
//!
//! Prices:
//! - GET /api/trading/prices/:symbol - Current market price
//! - PUT /api/trading/prices/:symbol - Set a price and run the fill pipeline
//!
//! Orders:
//! - GET /api/trading/orders - List orders, most recent first
//! - POST /api/trading/orders - Place a new order
//! - GET /api/trading/orders/:id - Get order details
//! - PATCH /api/trading/orders/:id - Modify an open order
//! - DELETE /api/trading/orders/:id - Cancel a resting order
//! - POST /api/trading/orders/:id/fill - Fill a resting order at its price
//!
//! Positions:
//! - GET /api/trading/positions - List open positions
//! - GET /api/trading/positions/:id - Get position details
//! - DELETE /api/trading/positions/:id - Close a position
//!
//! Trades:
//! - GET /api/trading/trades - Trade history (`status`, `tradingType` filters)
//! - GET /api/trading/trades/summary - Realized results over closed trades
//!
//! Balance:
//! - GET /api/trading/balance - Wallet balance

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::{
    EngineEvent, ModifyOrderRequest, Order, PlaceOrderRequest, Position, Trade, TradeFilter,
    TradeSummary,
};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Price routes
        .route("/prices/:symbol", get(get_price).put(set_price))
        // Order routes
        .route("/orders", get(list_orders).post(place_order))
        .route(
            "/orders/:id",
            get(get_order).patch(modify_order).delete(cancel_order),
        )
        .route("/orders/:id/fill", post(fill_order))
        // Position routes
        .route("/positions", get(list_positions))
        .route("/positions/:id", get(get_position).delete(close_position))
        // Trade routes
        .route("/trades", get(list_trades))
        .route("/trades/summary", get(trade_summary))
        // Balance
        .route("/balance", get(get_balance))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateResponse {
    pub symbol: String,
    pub price: f64,
    /// Everything the update caused, in order
    pub events: Vec<EngineEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub currency: String,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    pub price: f64,
}

async fn simulate_latency(state: &AppState) {
    if state.config.simulated_latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(state.config.simulated_latency_ms)).await;
    }
}

// =============================================================================
// Price Handlers
// =============================================================================

async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ApiResponse<PriceResponse>> {
    let symbol = symbol.to_uppercase();
    let price = state.trading.get_price(&symbol);
    Json(ApiResponse {
        data: PriceResponse { symbol, price },
    })
}

async fn set_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(request): Json<SetPriceRequest>,
) -> Result<Json<ApiResponse<PriceUpdateResponse>>> {
    if !request.price.is_finite() || request.price <= 0.0 {
        return Err(AppError::BadRequest("Price must be positive".to_string()));
    }
    let symbol = symbol.to_uppercase();
    let events = state.trading.set_market_price(&symbol, request.price)?;
    Ok(Json(ApiResponse {
        data: PriceUpdateResponse {
            symbol,
            price: request.price,
            events,
        },
    }))
}

// =============================================================================
// Order Handlers
// =============================================================================

async fn list_orders(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Order>>>> {
    simulate_latency(&state).await;
    let orders = state.trading.get_user_orders()?;
    Ok(Json(ApiResponse { data: orders }))
}

async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<Order>>> {
    simulate_latency(&state).await;
    let order = state.trading.place_order(request)?;
    Ok(Json(ApiResponse { data: order }))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = state
        .trading
        .get_order(id)?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;
    Ok(Json(ApiResponse { data: order }))
}

async fn modify_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ModifyOrderRequest>,
) -> Result<Json<ApiResponse<Order>>> {
    simulate_latency(&state).await;
    let order = state
        .trading
        .modify_order(id, request)?
        .ok_or_else(|| AppError::NotFound(format!("No open order {}", id)))?;
    Ok(Json(ApiResponse { data: order }))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Order>>> {
    simulate_latency(&state).await;
    let order = state
        .trading
        .cancel_order(id)?
        .ok_or_else(|| AppError::NotFound(format!("No resting order {}", id)))?;
    Ok(Json(ApiResponse { data: order }))
}

async fn fill_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Order>>> {
    simulate_latency(&state).await;
    let order = state
        .trading
        .fill_order(id)?
        .ok_or_else(|| AppError::NotFound(format!("No resting order {}", id)))?;
    Ok(Json(ApiResponse { data: order }))
}

// =============================================================================
// Position Handlers
// =============================================================================

async fn list_positions(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Position>>>> {
    simulate_latency(&state).await;
    let positions = state.trading.get_user_positions()?;
    Ok(Json(ApiResponse { data: positions }))
}

async fn get_position(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Position>>> {
    let position = state
        .trading
        .get_position(id)?
        .ok_or_else(|| AppError::NotFound(format!("Position {} not found", id)))?;
    Ok(Json(ApiResponse { data: position }))
}

async fn close_position(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<Trade>>> {
    simulate_latency(&state).await;
    let trade = state
        .trading
        .close_position(id)?
        .ok_or_else(|| AppError::NotFound(format!("Position {} not found", id)))?;
    Ok(Json(ApiResponse { data: trade }))
}

// =============================================================================
// Trade Handlers
// =============================================================================

async fn list_trades(
    State(state): State<AppState>,
    Query(filter): Query<TradeFilter>,
) -> Result<Json<ApiResponse<Vec<Trade>>>> {
    simulate_latency(&state).await;
    let trades = state.trading.list_trades(&filter)?;
    Ok(Json(ApiResponse { data: trades }))
}

async fn trade_summary(
    State(state): State<AppState>,
    Query(filter): Query<TradeFilter>,
) -> Result<Json<ApiResponse<TradeSummary>>> {
    let summary = state.trading.trade_summary(&filter)?;
    Ok(Json(ApiResponse { data: summary }))
}

async fn get_balance(State(state): State<AppState>) -> Json<ApiResponse<BalanceResponse>> {
    Json(ApiResponse {
        data: BalanceResponse {
            currency: state.trading.config().currency.clone(),
            balance: state.trading.balance(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::balance::InMemoryBalance;
    use crate::services::TradingService;
    use crate::types::{TradeStatus, TradingType};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(balance: f64) -> Router {
        let config = Config::default();
        let wallet = Arc::new(InMemoryBalance::with_balance(&config.balance_currency, balance));
        let trading = Arc::new(TradingService::new(config.engine_config(), wallet));
        let state = AppState {
            config: Arc::new(config),
            trading,
        };
        Router::new().nest("/api/trading", router()).with_state(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => request.body(Body::from(json.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_trade_query_parses_camel_case() {
        let filter: TradeFilter =
            serde_urlencoded::from_str("status=closed&tradingType=leverage").unwrap();
        assert_eq!(filter.status, Some(TradeStatus::Closed));
        assert_eq!(filter.trading_type, Some(TradingType::Leverage));

        let empty: TradeFilter = serde_urlencoded::from_str("").unwrap();
        assert!(empty.status.is_none());
    }

    #[tokio::test]
    async fn test_place_market_order() {
        let app = test_app(10_000.0);
        send(&app, "PUT", "/api/trading/prices/sol", Some(serde_json::json!({ "price": 100.0 }))).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/trading/orders",
            Some(serde_json::json!({
                "symbol": "SOL",
                "kind": "market",
                "side": "buy",
                "quantity": 10.0
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "filled");
        assert_eq!(body["data"]["price"], 100.0);

        let (_, balance) = send(&app, "GET", "/api/trading/balance", None).await;
        assert_eq!(balance["data"]["balance"], 9_000.0);
        assert_eq!(balance["data"]["currency"], "networth");
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_bad_request() {
        let app = test_app(50.0);
        let (status, body) = send(
            &app,
            "POST",
            "/api/trading/orders",
            Some(serde_json::json!({
                "symbol": "AAPL",
                "kind": "limit",
                "side": "buy",
                "quantity": 1.0,
                "price": 180.0
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INSUFFICIENT_BALANCE");
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_is_not_found() {
        let app = test_app(0.0);
        let (status, body) = send(&app, "DELETE", "/api/trading/orders/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_price_update_reports_fills() {
        let app = test_app(10_000.0);
        send(
            &app,
            "POST",
            "/api/trading/orders",
            Some(serde_json::json!({
                "symbol": "AAPL",
                "kind": "limit",
                "side": "buy",
                "quantity": 1.0,
                "price": 180.0
            })),
        )
        .await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/trading/prices/AAPL",
            Some(serde_json::json!({ "price": 179.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let types: Vec<&str> = body["data"]["events"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["type"].as_str())
            .collect();
        assert!(types.contains(&"order_filled"));

        let (_, trades) = send(&app, "GET", "/api/trading/trades?status=open", None).await;
        assert_eq!(trades["data"].as_array().unwrap().len(), 1);
        assert_eq!(trades["data"][0]["name"], "Apple Inc.");
    }

    #[tokio::test]
    async fn test_close_position_round_trip() {
        let app = test_app(10_000.0);
        send(&app, "PUT", "/api/trading/prices/ETH", Some(serde_json::json!({ "price": 2_000.0 }))).await;
        send(
            &app,
            "POST",
            "/api/trading/orders",
            Some(serde_json::json!({
                "symbol": "ETH",
                "kind": "market",
                "side": "buy",
                "quantity": 1.0
            })),
        )
        .await;
        send(&app, "PUT", "/api/trading/prices/ETH", Some(serde_json::json!({ "price": 2_100.0 }))).await;

        let (_, positions) = send(&app, "GET", "/api/trading/positions", None).await;
        let id = positions["data"][0]["id"].as_u64().unwrap();

        let (status, trade) = send(&app, "DELETE", &format!("/api/trading/positions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(trade["data"]["kind"], "close");
        assert_eq!(trade["data"]["pnl"], 100.0);

        let (_, balance) = send(&app, "GET", "/api/trading/balance", None).await;
        assert_eq!(balance["data"]["balance"], 10_100.0);
    }

    #[tokio::test]
    async fn test_invalid_price_is_rejected() {
        let app = test_app(0.0);
        let (status, _) = send(
            &app,
            "PUT",
            "/api/trading/prices/BTC",
            Some(serde_json::json!({ "price": 0.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
