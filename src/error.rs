use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::TemperatureHistory;

/// Failures reported by a [`crate::store::TimeSeriesStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("DB error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Unsupported query: {0}")]
    Unsupported(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the sample writer and history reader.
#[derive(Debug, Error)]
pub enum TemperatureError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Write of point {index} ({timestamp}) for device {device_id} failed: {source}")]
    WriteFailure {
        device_id: String,
        index: usize,
        timestamp: DateTime<Utc>,
        #[source]
        source: StoreError,
    },
    #[error("Query failed: {0}")]
    QueryFailure(#[source] StoreError),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Operation cancelled")]
    Cancelled,
}

/// A failed history read together with whatever was decoded before the failure.
///
/// `partial` is empty when the failure happened before any record was read
/// (bad duration key, query could not start).
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct HistoryError {
    #[source]
    pub kind: TemperatureError,
    pub partial: TemperatureHistory,
}

impl HistoryError {
    pub fn new(kind: TemperatureError, partial: TemperatureHistory) -> Self {
        Self { kind, partial }
    }

    /// Failure with nothing decoded.
    pub fn empty(kind: TemperatureError) -> Self {
        Self::new(kind, TemperatureHistory::new())
    }
}

impl From<TemperatureError> for HistoryError {
    fn from(kind: TemperatureError) -> Self {
        Self::empty(kind)
    }
}
