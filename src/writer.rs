//! Sample writer: turns one scan's temperature data into stored points.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TemperatureError;
use crate::models::ScanTemperature;
use crate::store::TimeSeriesStore;

// ---

/// Store the temperature data of one scan for `device_id`.
///
/// Points are written one at a time in table order (newest first). The first
/// rejected point aborts the call with [`TemperatureError::WriteFailure`];
/// points already written stay written. Repeated calls are not deduplicated.
pub async fn record_scan_temperature(
    store: &dyn TimeSeriesStore,
    device_id: &str,
    scan: &ScanTemperature,
    cancel: &CancellationToken,
) -> Result<(), TemperatureError> {
    // ---
    if device_id.is_empty() {
        return Err(TemperatureError::InvalidArgument(
            "device id must not be empty".into(),
        ));
    }

    let samples = scan.samples(device_id)?;
    debug!(
        device_id,
        count = samples.len(),
        capture_time = scan.capture_time(),
        "writing temperature samples"
    );

    for (index, sample) in samples.iter().enumerate() {
        let write = store.write_point(sample.to_point());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TemperatureError::Cancelled),
            res = write => res.map_err(|source| TemperatureError::WriteFailure {
                device_id: device_id.to_string(),
                index,
                timestamp: sample.timestamp,
                source,
            })?,
        }
    }

    Ok(())
}
