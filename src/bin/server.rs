//! Price Oracle Diagnostics Server
//!
//! HTTP/JSON surface over the oracle: current price, forced refresh, cache
//! status and USD conversion.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use price_oracle::error::Error;
use price_oracle::oracle::{OracleConfig, OracleService};

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared application state
pub struct AppState {
    pub oracle: OracleService,
}

// ═══════════════════════════════════════════════════════════════════════════════
// API TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub amount: Decimal,
}

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::OracleUnavailable { .. } | Error::AllFeedsFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::InvalidAmount(_) | Error::InvalidParameter { .. } | Error::InvalidPrice(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: price_oracle::error::Result<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => (error_status(&e), Json(ApiResponse::err(e.to_string()))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": price_oracle::SERVICE_NAME,
        "version": price_oracle::VERSION
    }))
}

/// GET /price - Current price through the fallback chain
async fn get_price(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(state.oracle.quote().await)
}

/// POST /price/refresh - Invalidate the cache and fetch again
async fn refresh_price(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(state.oracle.refresh().await)
}

/// GET /price/cache-status - Cache diagnostics
async fn cache_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.oracle.cache_status()))
}

/// GET /price/statistics - Usage counters
async fn statistics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.oracle.statistics()))
}

/// GET /price/convert?amount= - Price an ETH amount in USD
async fn convert(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
) -> impl IntoResponse {
    respond(state.oracle.convert_to_usd(query.amount).await)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/price", get(get_price))
        .route("/price/refresh", post(refresh_price))
        .route("/price/cache-status", get(cache_status))
        .route("/price/statistics", get(statistics))
        .route("/price/convert", get(convert))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let oracle = OracleService::new(OracleConfig::from_env())?;
    let state = Arc::new(AppState { oracle });

    let addr: SocketAddr = std::env::var("PRICE_ORACLE_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    info!("Starting price oracle server on {}", addr);
    info!("API endpoints:");
    info!("  GET  /health              - Health check");
    info!("  GET  /price               - Current ETH/USD price");
    info!("  POST /price/refresh       - Clear cache and refetch");
    info!("  GET  /price/cache-status  - Cache diagnostics");
    info!("  GET  /price/statistics    - Usage counters");
    info!("  GET  /price/convert       - Convert ?amount= ETH to USD");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
