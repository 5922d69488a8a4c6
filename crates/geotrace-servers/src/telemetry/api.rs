//! Router and handlers for the telemetry API.

use super::{auth::require_api_key, error::ApiError, TelemetryState};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use geotrace_core::{normalize, Payload, RecordId, RecordQuery, SortOrder, StoredRecord};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub fn router(state: TelemetryState) -> Router {
    let protected = Router::new()
        .route("/telemetry", post(ingest_handler))
        .route("/telemetry/{device_id}/last", get(last_handler))
        .route("/telemetry/{device_id}/history", get(history_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub id: RecordId,
    #[serde(rename = "serverReceivedAt")]
    pub server_received_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub count: usize,
    pub records: Vec<StoredRecord>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Normalise and store one payload.
async fn ingest_handler(
    State(state): State<TelemetryState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(body) = body?;
    let payload = Payload::try_from(body)?;

    let record = normalize(&payload).inspect_err(|e| {
        warn!(kind = e.kind(), field = e.field(), "rejected telemetry payload: {e}");
    })?;
    let server_received_at = record.server_received_at;
    let device_id = record.device_id.clone();
    let message_uuid = record.message_uuid.clone();

    let id = state.store.add(record).await?;
    info!(%id, %device_id, %message_uuid, "stored telemetry record");

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            ok: true,
            id,
            server_received_at,
        }),
    ))
}

/// Newest record for a device.
async fn last_handler(
    State(state): State<TelemetryState>,
    Path(device_id): Path<String>,
) -> Result<Json<StoredRecord>, ApiError> {
    state
        .store
        .last(&device_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// The `limit` most recent records for a device, newest first unless
/// `order=asc`.
async fn history_handler(
    State(state): State<TelemetryState>,
    Path(device_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(params) = params?;
    let limit = state.history.resolve(params.limit);
    let query = RecordQuery::newest(device_id.clone(), limit)
        .with_order(params.order.unwrap_or_default());

    let records = state.store.query(query).await?;
    Ok(Json(HistoryResponse {
        device_id,
        count: records.len(),
        records,
    }))
}
