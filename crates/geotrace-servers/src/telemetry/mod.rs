//! Telemetry ingest API.
//!
//! Clients POST geolocation payloads; each is run through the normalizer and
//! persisted in the injected [`TelemetryStore`]. The newest record and a
//! bounded history can be read back per device.
//!
//! Routes:
//! - `GET  /health` - liveness, never authenticated
//! - `POST /telemetry` - ingest one payload
//! - `GET  /telemetry/{device_id}/last` - newest record for a device
//! - `GET  /telemetry/{device_id}/history?limit=N&order=asc|desc` - the `limit`
//!   most recent records, in the requested order

pub mod api;
pub mod auth;
pub mod error;

pub use api::router;
pub use error::ApiError;

use anyhow::Context;
use geotrace_core::{config::TelemetryConfig, store, TelemetryStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the handlers need. Cloned per request; all fields are cheap
/// handles.
#[derive(Clone)]
pub struct TelemetryState {
    pub store: Arc<dyn TelemetryStore>,
    pub api_key: Option<Arc<str>>,
    pub history: HistoryLimits,
}

impl TelemetryState {
    pub fn new(store: Arc<dyn TelemetryStore>, config: &TelemetryConfig) -> Self {
        Self {
            store,
            api_key: config.api_key().map(Arc::from),
            history: HistoryLimits {
                default: config.history_default_limit,
                max: config.history_max_limit,
            },
        }
    }
}

/// Bounds for the `limit` parameter of the history route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub default: usize,
    pub max: usize,
}

impl HistoryLimits {
    /// The limit to query with: the requested value (or the default),
    /// clamped to `1..=max`.
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        let max = self.max.max(1);
        requested.unwrap_or(self.default).clamp(1, max)
    }
}

/// Open the configured store, bind `config.listen` and serve until shutdown.
pub async fn run(config: &TelemetryConfig) -> anyhow::Result<()> {
    let store = store::open(&config.store)
        .await
        .context("failed to open telemetry store")?;
    let state = TelemetryState::new(store, config);
    if state.api_key.is_none() {
        warn!("no telemetry api_key configured; requests are not authenticated");
    }

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind telemetry API to {}", config.listen))?;
    info!("telemetry API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(crate::shutdown_signal())
        .await
        .context("telemetry API failed")
}
