//! Request logger: a catch-all HTTP handler that logs every request it sees
//! and answers `200 OK`.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    Router,
};
use geotrace_core::config::RequestLogConfig;
use tracing::info;

#[derive(Debug, Clone)]
struct LogState {
    max_body_bytes: usize,
}

pub fn router(max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(log_request_handler)
        .with_state(LogState { max_body_bytes })
}

pub async fn run(config: &RequestLogConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind request logger to {}", config.listen))?;
    info!("request logger listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(config.max_body_bytes))
        .with_graceful_shutdown(crate::shutdown_signal())
        .await
        .context("request logger failed")
}

async fn log_request_handler(
    State(state): State<LogState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    info!(
        %method,
        %uri,
        headers = ?crate::http_echo::flatten_headers(&headers),
        body = %render_body(&body, state.max_body_bytes),
        "request"
    );
    "OK"
}

/// Lossy UTF-8 view of `body`, cut at `max` bytes with a note of how much
/// was dropped.
fn render_body(body: &[u8], max: usize) -> String {
    if body.len() <= max {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!(
        "{}… ({} more bytes)",
        String::from_utf8_lossy(&body[..max]),
        body.len() - max
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
