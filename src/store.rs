//! Minimal time-series storage abstraction.
//!
//! The temperature subsystem only needs two things from a store: append one
//! immutable tagged point, and run a grouped aggregation query whose result is
//! consumed as a stream of records. Any engine that can do both (PostgreSQL via
//! [`crate::postgres::PgStore`], the in-process [`crate::memory::MemoryStore`])
//! plugs in behind [`TimeSeriesStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::StoreError;

// ---

/// Record key holding the point (or bucket) time.
pub const TIME_KEY: &str = "_time";

/// A single tag or field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    Text(String),
    Time(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type name, used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::I64(_) => "i64",
            FieldValue::F64(_) => "f64",
            FieldValue::Bool(_) => "bool",
            FieldValue::Text(_) => "text",
            FieldValue::Time(_) => "time",
        }
    }
}

/// One immutable time-series point as handed to [`TimeSeriesStore::write_point`].
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub time: DateTime<Utc>,
}

/// One row of a query result: tag and field values by name, plus [`TIME_KEY`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly handy when assembling records by hand.
    pub fn with(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn time(&self) -> Option<&FieldValue> {
        self.values.get(TIME_KEY)
    }
}

/// Aggregation query issued by the history reader.
///
/// Results must be grouped by `group_by` and ordered by time ascending
/// within each group. When `bucket` is `None` raw points are returned,
/// otherwise `field` is averaged (rounded to an integer) per bucket and the
/// bucket start becomes the record time.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub measurement: String,
    pub group_by: String,
    pub field: String,
    /// Inclusive lower bound; `None` means no lower bound.
    pub start: Option<DateTime<Utc>>,
    pub bucket: Option<chrono::Duration>,
}

/// Result stream of a query. Errors may appear after some records.
pub type RecordStream = BoxStream<'static, Result<Record, StoreError>>;

/// Storage surface used by the writer and reader.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Append one point.
    async fn write_point(&self, point: Point) -> Result<(), StoreError>;

    /// Start a query. Failures to start are returned here; failures while
    /// reading are yielded through the stream.
    async fn query(&self, query: HistoryQuery) -> Result<RecordStream, StoreError>;
}
