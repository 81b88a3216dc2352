//! Health check endpoint.

use super::AppState;
use crate::sync::TransportFactory;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok`, or `degraded` when the local store cannot be read.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Deals in the local store, if readable.
    pub stored_deals: Option<u64>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let stored_deals = match state.sync().stored_deal_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not count stored deals");
            None
        }
    };

    Json(HealthStatus {
        status: if stored_deals.is_some() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stored_deals,
        uptime_seconds: uptime,
    })
}
