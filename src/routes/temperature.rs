use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::SharedStore;
use crate::{reader, writer, CollectorScan, Config, ScanTemperature, TemperatureError};

// ---

pub fn router() -> Router<(SharedStore, Config)> {
    // ---
    Router::new()
        .route("/api/device/{device_id}/temperature", post(record_handler))
        .route("/api/summary/temp", get(history_handler))
}

/// Query parameters for `GET /api/summary/temp`
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// `week` (default), `month`, `year` or `forever`
    duration_key: Option<String>,
}

async fn record_handler(
    Path(device_id): Path<String>,
    State((store, config)): State<(SharedStore, Config)>,
    Json(scan): Json<CollectorScan>,
) -> (StatusCode, Json<Value>) {
    // ---
    let cancel = deadline(&config);
    let _guard = cancel.clone().drop_guard();

    let scan = ScanTemperature::from(scan);
    match writer::record_scan_temperature(store.as_ref(), &device_id, &scan, &cancel).await {
        Ok(()) => {
            info!("POST temperature for {} stored", device_id);
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(e) => {
            error!("Failed to store temperature for {}: {}", device_id, e);
            (
                status_for(&e),
                Json(json!({ "success": false, "errors": [e.to_string()] })),
            )
        }
    }
}

async fn history_handler(
    Query(params): Query<HistoryParams>,
    State((store, config)): State<(SharedStore, Config)>,
) -> (StatusCode, Json<Value>) {
    // ---
    let cancel = deadline(&config);
    let _guard = cancel.clone().drop_guard();

    let duration_key = params.duration_key.as_deref().unwrap_or("week");
    match reader::get_history(store.as_ref(), duration_key, &cancel).await {
        Ok(history) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "temp_history": history } })),
        ),
        Err(e) => {
            // Partial data is passed through; clients decide whether to chart it
            warn!(
                "Temperature history for {} failed with {} devices decoded: {}",
                duration_key,
                e.partial.len(),
                e
            );
            (
                status_for(&e.kind),
                Json(json!({
                    "success": false,
                    "errors": [e.to_string()],
                    "data": { "temp_history": e.partial },
                })),
            )
        }
    }
}

/// Token cancelled once the configured store timeout elapses.
fn deadline(config: &Config) -> CancellationToken {
    // ---
    let token = CancellationToken::new();
    let timer = token.clone();
    let timeout = Duration::from_secs(u64::from(config.store_timeout_secs));

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });
    token
}

fn status_for(e: &TemperatureError) -> StatusCode {
    match e {
        TemperatureError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        TemperatureError::WriteFailure { .. } | TemperatureError::QueryFailure(_) => {
            StatusCode::BAD_GATEWAY
        }
        TemperatureError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        TemperatureError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    }
}
