//! Duration keys and the lookback/resolution policy behind them.
//!
//! Each [`DurationKey`] maps to one row of [`POLICIES`]. Adding a key means
//! adding an enum variant and a table row; the reader does not branch on keys.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::error::TemperatureError;
use crate::models::{DEVICE_TAG, MEASUREMENT, TEMP_FIELD};
use crate::store::HistoryQuery;

// ---

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationKey {
    Week = 0,
    Month = 1,
    Year = 2,
    Forever = 3,
}

/// Lookback window and bucket size for one duration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    pub key: DurationKey,
    /// `None` is unbounded.
    pub lookback_secs: Option<i64>,
    /// `None` returns raw points.
    pub bucket_secs: Option<i64>,
}

/// Indexed by `DurationKey as usize`.
pub static POLICIES: [DurationPolicy; 4] = [
    DurationPolicy {
        key: DurationKey::Week,
        lookback_secs: Some(7 * DAY),
        bucket_secs: None,
    },
    DurationPolicy {
        key: DurationKey::Month,
        lookback_secs: Some(30 * DAY),
        bucket_secs: Some(HOUR),
    },
    DurationPolicy {
        key: DurationKey::Year,
        lookback_secs: Some(365 * DAY),
        bucket_secs: Some(DAY),
    },
    DurationPolicy {
        key: DurationKey::Forever,
        lookback_secs: None,
        bucket_secs: Some(7 * DAY),
    },
];

impl DurationKey {
    pub const ALL: [DurationKey; 4] = [
        DurationKey::Week,
        DurationKey::Month,
        DurationKey::Year,
        DurationKey::Forever,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DurationKey::Week => "week",
            DurationKey::Month => "month",
            DurationKey::Year => "year",
            DurationKey::Forever => "forever",
        }
    }

    pub fn policy(self) -> &'static DurationPolicy {
        &POLICIES[self as usize]
    }
}

impl fmt::Display for DurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationKey {
    type Err = TemperatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DurationKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TemperatureError::InvalidArgument(format!("unknown duration key: {s:?}")))
    }
}

impl DurationPolicy {
    pub fn lookback(&self) -> Option<Duration> {
        self.lookback_secs.map(Duration::seconds)
    }

    pub fn bucket(&self) -> Option<Duration> {
        self.bucket_secs.map(Duration::seconds)
    }

    /// Build the temperature history query for a read starting at `now`.
    pub fn query(&self, now: DateTime<Utc>) -> HistoryQuery {
        // ---
        HistoryQuery {
            measurement: MEASUREMENT.to_string(),
            group_by: DEVICE_TAG.to_string(),
            field: TEMP_FIELD.to_string(),
            start: self.lookback().and_then(|window| now.checked_sub_signed(window)),
            bucket: self.bucket(),
        }
    }
}
