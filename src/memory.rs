//! In-process [`TimeSeriesStore`].
//!
//! Keeps every point in a `Vec` and answers [`HistoryQuery`] with the same
//! semantics as the PostgreSQL store: lower time bound, optional bucket
//! averaging, grouping by one tag and ascending time within a group. Used by
//! the test-suite and handy for running the service without a database.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::StoreError;
use crate::store::{FieldValue, HistoryQuery, Point, Record, RecordStream, TimeSeriesStore, TIME_KEY};

// ---

#[derive(Debug, Default)]
pub struct MemoryStore {
    points: Mutex<Vec<Point>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all points in write order.
    pub fn points(&self) -> Result<Vec<Point>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Point>>, StoreError> {
        self.points
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn write_point(&self, point: Point) -> Result<(), StoreError> {
        self.lock()?.push(point);
        Ok(())
    }

    async fn query(&self, query: HistoryQuery) -> Result<RecordStream, StoreError> {
        // ---
        let bucket_secs = match query.bucket {
            Some(b) if b.num_seconds() <= 0 => {
                return Err(StoreError::Unsupported(format!("bucket must be positive, got {b}")))
            }
            Some(b) => Some(b.num_seconds()),
            None => None,
        };

        let points: Vec<Point> = self
            .lock()?
            .iter()
            .filter(|p| p.measurement == query.measurement)
            .filter(|p| query.start.map_or(true, |start| p.time >= start))
            .cloned()
            .collect();

        // Untagged points group under `None`, which sorts first.
        let mut groups: BTreeMap<Option<String>, Vec<Point>> = BTreeMap::new();
        for p in points {
            groups
                .entry(p.tags.get(&query.group_by).cloned())
                .or_default()
                .push(p);
        }

        let mut records = Vec::new();
        for (tag, mut points) in groups {
            points.sort_by_key(|p| p.time);
            match bucket_secs {
                None => records.extend(points.iter().map(raw_record)),
                Some(secs) => records.extend(bucket_records(&query, tag.as_deref(), &points, secs)),
            }
        }

        Ok(stream::iter(records.into_iter().map(Ok::<_, StoreError>)).boxed())
    }
}

fn raw_record(p: &Point) -> Record {
    // ---
    let mut record = Record::new();
    for (k, v) in &p.tags {
        record.values.insert(k.clone(), FieldValue::Text(v.clone()));
    }
    for (k, v) in &p.fields {
        record.values.insert(k.clone(), v.clone());
    }
    record.with(TIME_KEY, FieldValue::Time(p.time))
}

/// Average `query.field` per bucket. Points whose field is not an integer
/// do not contribute; a bucket with no integer values yields no record.
/// Sums are kept in `i128` so any run of `i64` values fits.
fn bucket_records(query: &HistoryQuery, tag: Option<&str>, points: &[Point], secs: i64) -> Vec<Record> {
    // ---
    let mut buckets: BTreeMap<i64, (i128, i64)> = BTreeMap::new();
    for p in points {
        if let Some(v) = p.fields.get(&query.field).and_then(FieldValue::as_i64) {
            let start = p.time.timestamp().div_euclid(secs) * secs;
            let (sum, count) = buckets.entry(start).or_default();
            *sum += i128::from(v);
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .filter_map(|(start, (sum, count))| {
            let time = DateTime::<Utc>::from_timestamp(start, 0)?;
            let avg = (sum as f64 / count as f64).round() as i64;
            let mut record = Record::new()
                .with(TIME_KEY, FieldValue::Time(time))
                .with(query.field.clone(), FieldValue::I64(avg));
            if let Some(tag) = tag {
                record = record.with(query.group_by.clone(), FieldValue::Text(tag.to_string()));
            }
            Some(record)
        })
        .collect()
}
