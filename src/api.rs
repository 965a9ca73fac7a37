//! HTTP surface
//!
//! `GET /api/metrics?token=<addr>&chainId=<id>` runs one full computation
//! per request. Nothing is cached server side; the `Cache-Control` header
//! tells clients and proxies the same.

use alloy_primitives::Address;
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{MetricsAggregator, MetricsRequest};
use crate::config::{parse_address, Settings};
use crate::metrics::MetricsResult;

pub const SERVICE_NAME: &str = "dex-metrics";

const ENDPOINTS: [&str; 3] = ["/api/metrics", "/api/health", "/api/status"];

// ============================================
// STATE
// ============================================

pub struct AppState {
    pub aggregator: Arc<MetricsAggregator>,
    pub default_token: Address,
    pub default_chain_id: u64,
    pub rpc_url: Option<String>,
    pub exclude: Vec<Address>,
    pub cache_control: HeaderValue,
}

impl AppState {
    pub fn new(aggregator: Arc<MetricsAggregator>, settings: &Settings) -> Result<Self> {
        let cache_control = HeaderValue::from_str(&settings.cache_control)
            .wrap_err_with(|| format!("Invalid CACHE_CONTROL {:?}", settings.cache_control))?;

        Ok(Self {
            aggregator,
            default_token: settings.token,
            default_chain_id: settings.chain_id,
            rpc_url: settings.rpc_url.clone(),
            exclude: settings.exclude_addresses.clone(),
            cache_control,
        })
    }
}

// ============================================
// ERRORS
// ============================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ============================================
// HANDLERS
// ============================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub token: Option<String>,
    pub chain_id: Option<String>,
}

impl MetricsQuery {
    fn into_request(self, state: &AppState) -> Result<MetricsRequest, ApiError> {
        let token = match self.token.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_address(s).map_err(|e| ApiError::BadRequest(format!("invalid token: {}", e)))?,
            None => state.default_token,
        };

        let chain_id = match self.chain_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid chainId: {:?}", s)))?,
            None => state.default_chain_id,
        };

        Ok(MetricsRequest {
            token,
            chain_id,
            rpc_url: state.rpc_url.clone(),
            exclude: state.exclude.clone(),
        })
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.into_request(&state)?;
    info!("GET /api/metrics token={} chain={}", request.token, request.chain_id);

    let result: MetricsResult = state.aggregator.compute(&request).await.map_err(|e| {
        warn!("Metrics request failed: {}", e);
        ApiError::Internal(e.to_string())
    })?;

    Ok(([(header::CACHE_CONTROL, state.cache_control.clone())], Json(result)))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainSummary {
    chain_id: u64,
    name: String,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let chains = state.aggregator.chains();
    let supported: Vec<ChainSummary> = chains
        .chain_ids()
        .into_iter()
        .filter_map(|id| chains.get(id).ok())
        .map(|c| ChainSummary {
            chain_id: c.chain_id,
            name: c.name.clone(),
        })
        .collect();

    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
        "defaultToken": state.default_token,
        "defaultChainId": state.default_chain_id,
        "chains": supported,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/api/status", get(status))
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .with_state(Arc::new(state))
}

// ============================================
// TESTS
// ============================================
