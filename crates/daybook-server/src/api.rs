//! HTTP API.
//!
//! The wire contract keeps the original sender behaviour: ingestion bodies
//! are base64-encoded JSON objects, retrieval is parameterised through
//! request headers (`filters` carries a JSON array of filter expressions,
//! `unique-attr` names the distinct column), and record ids travel back as
//! plain text.

#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use daybook_core::LogRecord;
use daybook_store::{LogStore, StoreError};

use crate::access::record_access;
use crate::geo::GeoLocator;

/// Shared API state.
#[derive(Clone)]
pub struct ApiState {
    pub store: LogStore,
    pub geo: Arc<dyn GeoLocator>,
    /// Number of daily partitions each read fans out over.
    pub partition_days: u32,
}

/// Create the API router.
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/logs", get(handle_get_logs).post(handle_ingest))
        .route("/distinct", get(handle_distinct))
        .route("/access", post(handle_access))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Handle GET /health - liveness probe
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handle POST /logs - ingest one record.
///
/// The body is a base64-encoded JSON object. The `x-forwarded-for` header
/// (or, failing that, the peer address) overrides any `ip` field in the
/// body, and the sender's `user-agent` is captured as an attribute. The
/// response body is the new record id as text.
async fn handle_ingest(
    State(state): State<ApiState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<std::net::SocketAddr>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(body.as_ref())
        .map_err(|_| ApiError::BadRequest("body is not valid base64".to_owned()))?;
    let parsed: Value = serde_json::from_slice(&decoded)
        .map_err(|e| ApiError::BadRequest(format!("body is not valid JSON: {e}")))?;
    let mut fields: Map<String, Value> = match parsed {
        Value::Object(map) => map,
        _ => return Err(ApiError::BadRequest("body must be a JSON object".to_owned())),
    };

    if let Some(agent) = header_text(&headers, "user-agent") {
        fields.insert("user-agent".to_owned(), Value::String(agent.to_owned()));
    }
    if let Some(forwarded) = header_text(&headers, "x-forwarded-for") {
        fields.insert("ip".to_owned(), Value::String(forwarded.to_owned()));
    } else if let Some(ConnectInfo(addr)) = peer {
        fields.insert("ip".to_owned(), Value::String(addr.ip().to_string()));
    }

    let id = state.store.ingest(fields).await?;
    Ok(id.to_string())
}

/// Handle GET /logs - filtered retrieval.
///
/// The `filters` header carries a JSON array of filter expressions; the
/// `start-index` header is validated for shape but not yet applied.
async fn handle_get_logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let start_index = match header_text(&headers, "start-index") {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| ApiError::BadRequest("invalid startindex".to_owned()))?,
        ),
        None => None,
    };

    let filters: Vec<String> = match header_text(&headers, "filters") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ApiError::BadRequest("filters header is not a JSON array".to_owned()))?,
        None => Vec::new(),
    };

    let records = state
        .store
        .query(&filters, state.partition_days, start_index)
        .await?;
    Ok(Json(records))
}

/// Handle GET /distinct - de-duplicated values of one column or attribute,
/// named by the `unique-attr` header.
async fn handle_distinct(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, ApiError> {
    let attr_key = header_text(&headers, "unique-attr")
        .ok_or_else(|| ApiError::BadRequest("missing attr key".to_owned()))?;

    let values = state.store.distinct(attr_key, state.partition_days).await?;
    Ok(Json(values))
}

/// Handle POST /access - record one access-log entry.
///
/// The body is the caller address to geolocate; the handler also sweeps
/// recent partitions for entries whose location is still unresolved.
async fn handle_access(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<String, ApiError> {
    let ip = std::str::from_utf8(body.as_ref())
        .map_err(|_| ApiError::BadRequest("body is not valid UTF-8".to_owned()))?
        .trim();
    if ip.is_empty() {
        return Err(ApiError::BadRequest("missing address".to_owned()));
    }

    let id = record_access(&state.store, state.geo.as_ref(), ip).await?;
    Ok(id.to_string())
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// API-level errors.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => Self::BadRequest(msg),
            StoreError::Filter(e) => Self::BadRequest(e.to_string()),
            StoreError::NoData => Self::NotFound(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Store(err) => {
                // Log the full error server-side; the client gets a
                // sanitised message so storage details never leak.
                tracing::error!(error = %err, "storage operation failed");
                let sanitised = match err {
                    StoreError::Provisioning(_) => "storage provisioning error".to_owned(),
                    _ => "storage access error".to_owned(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, sanitised)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
