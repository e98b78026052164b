//! History reader: aggregated per-device temperature history.

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::duration::DurationKey;
use crate::error::{HistoryError, TemperatureError};
use crate::models::{TemperatureHistory, TemperatureSample};
use crate::store::TimeSeriesStore;

// ---

/// Fetch temperature history for a duration key (`week`, `month`, `year`,
/// `forever`).
///
/// Unknown keys fail with [`TemperatureError::InvalidArgument`] before the
/// store is touched.
pub async fn get_history(
    store: &dyn TimeSeriesStore,
    duration_key: &str,
    cancel: &CancellationToken,
) -> Result<TemperatureHistory, HistoryError> {
    // ---
    let key: DurationKey = duration_key.parse()?;
    get_history_for(store, key, cancel).await
}

/// Fetch temperature history for an already parsed key.
///
/// On failure the returned [`HistoryError`] carries every sample decoded
/// before the fault, so the caller can decide whether a partial history is
/// still useful. Records without a device tag are skipped.
pub async fn get_history_for(
    store: &dyn TimeSeriesStore,
    key: DurationKey,
    cancel: &CancellationToken,
) -> Result<TemperatureHistory, HistoryError> {
    // ---
    let query = key.policy().query(Utc::now());
    debug!(duration_key = %key, ?query, "querying temperature history");

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TemperatureError::Cancelled.into()),
        res = store.query(query) => res.map_err(TemperatureError::QueryFailure)?,
    };

    let mut history = TemperatureHistory::new();
    let mut skipped = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(HistoryError::new(TemperatureError::Cancelled, history));
            }
            next = stream.next() => next,
        };

        let record = match next {
            None => break,
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                warn!(
                    duration_key = %key,
                    devices = history.len(),
                    "temperature query failed mid-stream: {}",
                    e
                );
                return Err(HistoryError::new(TemperatureError::QueryFailure(e), history));
            }
        };

        match TemperatureSample::from_record(&record) {
            Ok(Some(sample)) => history
                .entry(sample.device_id.clone())
                .or_default()
                .push(sample),
            Ok(None) => skipped += 1,
            Err(e) => return Err(HistoryError::new(e, history)),
        }
    }

    if skipped > 0 {
        debug!(duration_key = %key, skipped, "skipped records without a device tag");
    }
    info!(duration_key = %key, devices = history.len(), "temperature history loaded");

    Ok(history)
}
