//! HTTP echo server.
//!
//! Every request, whatever its method or path, is answered with a JSON
//! description of itself: method, path, query, headers and body. Useful for
//! checking what a client or proxy actually sends.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::Query,
    http::{HeaderMap, Method, Uri},
    response::Json,
    routing::get,
    Router,
};
use geotrace_core::config::ListenConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The reflected request.
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub method: String,
    pub path: String,
    /// Query key to value; repeated keys are joined with `, `.
    pub query: BTreeMap<String, String>,
    /// Header name to value; repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when the body is JSON, the text otherwise, `null` when empty.
    pub body: serde_json::Value,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(echo_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: &ListenConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind HTTP echo server to {}", config.listen))?;
    info!("HTTP echo server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router())
        .with_graceful_shutdown(crate::shutdown_signal())
        .await
        .context("HTTP echo server failed")
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn echo_handler(
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<EchoResponse> {
    Json(EchoResponse {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: join_repeated(query),
        headers: flatten_headers(&headers),
        body: reflect_body(&body),
    })
}

pub(crate) fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    join_repeated(headers.iter().map(|(name, value)| {
        (
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
    }))
}

/// Collapse repeated keys into one entry, values joined with `, ` in order.
fn join_repeated(pairs: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in pairs {
        out.entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

fn reflect_body(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
