//! Temperature data model shared by the write and read paths.
//!
//! Both paths project a [`TemperatureSample`] onto the same point layout:
//! measurement [`MEASUREMENT`], tag [`DEVICE_TAG`], integer field
//! [`TEMP_FIELD`], and the record time under [`TIME_KEY`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TemperatureError;
use crate::store::{FieldValue, Point, Record, TIME_KEY};

// ---

pub const MEASUREMENT: &str = "temp";
pub const DEVICE_TAG: &str = "device_id";
pub const TEMP_FIELD: &str = "temp";

/// Per-device temperature history, keys are device ids.
pub type TemperatureHistory = BTreeMap<String, Vec<TemperatureSample>>;

/// A single temperature reading for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemperatureSample {
    // ---
    #[serde(skip_serializing)]
    pub device_id: String,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "temp")]
    pub temperature: i64,
}

impl TemperatureSample {
    // ---
    pub fn to_point(&self) -> Point {
        // ---
        let mut tags = BTreeMap::new();
        tags.insert(DEVICE_TAG.to_string(), self.device_id.clone());

        let mut fields = BTreeMap::new();
        fields.insert(TEMP_FIELD.to_string(), FieldValue::I64(self.temperature));

        Point {
            measurement: MEASUREMENT.to_string(),
            tags,
            fields,
            time: self.timestamp,
        }
    }

    /// Decode a query record.
    ///
    /// Returns `Ok(None)` when the record has no device tag, since it cannot
    /// be attributed to any device. A mistyped device tag, or a missing or
    /// mistyped time or temperature, is a [`TemperatureError::Decode`].
    pub fn from_record(record: &Record) -> Result<Option<Self>, TemperatureError> {
        // ---
        let device_id = match record.get(DEVICE_TAG) {
            Some(value) => value.as_str().ok_or_else(|| {
                TemperatureError::Decode(format!(
                    "{DEVICE_TAG} is {}, expected text",
                    value.kind()
                ))
            })?,
            None => return Ok(None),
        };

        let timestamp = match record.time() {
            Some(value) => value.as_time().ok_or_else(|| {
                TemperatureError::Decode(format!(
                    "device {device_id}: {TIME_KEY} is {}, expected time",
                    value.kind()
                ))
            })?,
            None => {
                return Err(TemperatureError::Decode(format!(
                    "device {device_id}: record has no {TIME_KEY}"
                )))
            }
        };

        let temperature = match record.get(TEMP_FIELD) {
            Some(value) => value.as_i64().ok_or_else(|| {
                TemperatureError::Decode(format!(
                    "device {device_id} at {timestamp}: {TEMP_FIELD} is {}, expected i64",
                    value.kind()
                ))
            })?,
            None => {
                return Err(TemperatureError::Decode(format!(
                    "device {device_id} at {timestamp}: record has no {TEMP_FIELD} field"
                )))
            }
        };

        Ok(Some(Self {
            device_id: device_id.to_string(),
            timestamp,
            temperature,
        }))
    }
}

/// A non-empty backfill table logged by the drive, newest entry first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable {
    interval_minutes: u32,
    entries: Vec<i64>,
}

impl HistoryTable {
    /// `None` when `entries` is empty.
    pub fn new(interval_minutes: u32, entries: Vec<i64>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        Some(Self {
            interval_minutes,
            entries,
        })
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn entries(&self) -> &[i64] {
        &self.entries
    }
}

/// Temperature data from a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTemperature {
    /// Backfill table; entry `i` was logged `interval * i` minutes before capture.
    HistoricalTable {
        capture_time: i64,
        table: HistoryTable,
    },
    /// Only the value read at capture time.
    CurrentReading { capture_time: i64, temperature: i64 },
}

impl ScanTemperature {
    /// Prefer the table when there is one with entries, else the current value.
    pub fn from_scan(
        capture_time: i64,
        current: i64,
        history: Option<(u32, Vec<i64>)>,
    ) -> Self {
        // ---
        match history.and_then(|(interval, entries)| HistoryTable::new(interval, entries)) {
            Some(table) => ScanTemperature::HistoricalTable {
                capture_time,
                table,
            },
            None => ScanTemperature::CurrentReading {
                capture_time,
                temperature: current,
            },
        }
    }

    pub fn capture_time(&self) -> i64 {
        match self {
            ScanTemperature::HistoricalTable { capture_time, .. }
            | ScanTemperature::CurrentReading { capture_time, .. } => *capture_time,
        }
    }

    /// Expand the scan into samples in emission order.
    pub fn samples(&self, device_id: &str) -> Result<Vec<TemperatureSample>, TemperatureError> {
        // ---
        match self {
            ScanTemperature::HistoricalTable {
                capture_time,
                table,
            } => {
                let step = i64::from(table.interval_minutes) * 60;
                table
                    .entries
                    .iter()
                    .enumerate()
                    .map(|(ndx, temp)| {
                        let offset = (ndx as i64).checked_mul(step);
                        let secs = offset.and_then(|o| capture_time.checked_sub(o));
                        Ok(TemperatureSample {
                            device_id: device_id.to_string(),
                            timestamp: epoch_seconds(secs)?,
                            temperature: *temp,
                        })
                    })
                    .collect()
            }
            ScanTemperature::CurrentReading {
                capture_time,
                temperature,
            } => Ok(vec![TemperatureSample {
                device_id: device_id.to_string(),
                timestamp: epoch_seconds(Some(*capture_time))?,
                temperature: *temperature,
            }]),
        }
    }
}

fn epoch_seconds(secs: Option<i64>) -> Result<DateTime<Utc>, TemperatureError> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| TemperatureError::InvalidArgument("scan time out of range".into()))
}

/// Collector scan payload, only the parts carrying temperature data.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorScan {
    // ---
    pub local_time: LocalTime,
    #[serde(default)]
    pub temperature: CurrentTemperature,
    #[serde(default)]
    pub ata_sct_temperature_history: Option<SctTemperatureHistory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalTime {
    pub time_t: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentTemperature {
    #[serde(default)]
    pub current: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SctTemperatureHistory {
    #[serde(default)]
    pub logging_interval_minutes: u32,
    #[serde(default)]
    pub table: Vec<i64>,
}

impl From<CollectorScan> for ScanTemperature {
    fn from(scan: CollectorScan) -> Self {
        ScanTemperature::from_scan(
            scan.local_time.time_t,
            scan.temperature.current,
            scan.ata_sct_temperature_history
                .map(|h| (h.logging_interval_minutes, h.table)),
        )
    }
}
