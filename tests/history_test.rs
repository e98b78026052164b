//! History reader behaviour against a scripted store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use drive_temp_history::reader::get_history;
use drive_temp_history::store::TIME_KEY;
use drive_temp_history::{
    FieldValue, HistoryQuery, Point, Record, RecordStream, StoreError, TemperatureError,
    TimeSeriesStore,
};

// ---

/// Store that replays a fixed result stream and counts queries.
struct ScriptedStore {
    script: Mutex<Option<Vec<Result<Record, StoreError>>>>,
    fail_to_start: bool,
    queries: AtomicUsize,
    last_query: Mutex<Option<HistoryQuery>>,
}

impl ScriptedStore {
    fn new(script: Vec<Result<Record, StoreError>>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            fail_to_start: false,
            queries: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    fn failing() -> Self {
        Self {
            fail_to_start: true,
            ..Self::new(Vec::new())
        }
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSeriesStore for ScriptedStore {
    async fn write_point(&self, _point: Point) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("read-only".into()))
    }

    async fn query(&self, query: HistoryQuery) -> Result<RecordStream, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query);
        if self.fail_to_start {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let script = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(stream::iter(script).boxed())
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn record(device: &str, secs: i64, temp: i64) -> Record {
    Record::new()
        .with("device_id", FieldValue::Text(device.into()))
        .with(TIME_KEY, FieldValue::Time(ts(secs)))
        .with("temp", FieldValue::I64(temp))
}

#[tokio::test]
async fn unknown_key_is_rejected_without_query() {
    // ---
    let store = ScriptedStore::new(vec![Ok(record("a", 0, 40))]);
    let err = assert_err!(get_history(&store, "bogus", &CancellationToken::new()).await);

    assert!(matches!(err.kind, TemperatureError::InvalidArgument(_)));
    assert!(err.partial.is_empty());
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn week_groups_two_devices_in_time_order() {
    // ---
    let store = ScriptedStore::new(vec![
        Ok(record("wwn-a", 100, 40)),
        Ok(record("wwn-a", 200, 41)),
        Ok(record("wwn-a", 300, 42)),
        Ok(record("wwn-b", 100, 30)),
        Ok(record("wwn-b", 200, 31)),
        Ok(record("wwn-b", 300, 32)),
    ]);

    let history = assert_ok!(get_history(&store, "week", &CancellationToken::new()).await);
    assert_eq!(store.query_count(), 1);
    assert_eq!(history.len(), 2);

    for (device, base) in [("wwn-a", 40), ("wwn-b", 30)] {
        let samples = &history[device];
        let got: Vec<(DateTime<Utc>, i64)> =
            samples.iter().map(|s| (s.timestamp, s.temperature)).collect();
        assert_eq!(
            got,
            vec![(ts(100), base), (ts(200), base + 1), (ts(300), base + 2)]
        );
        assert!(samples.iter().all(|s| s.device_id == device));
    }

    let query = store.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.measurement, "temp");
    assert_eq!(query.group_by, "device_id");
    assert!(query.start.is_some());
    assert!(query.bucket.is_none());
}

#[tokio::test]
async fn forever_query_is_unbounded_and_bucketed() {
    // ---
    let store = ScriptedStore::new(Vec::new());
    let history = assert_ok!(get_history(&store, "forever", &CancellationToken::new()).await);
    assert!(history.is_empty());

    let query = store.last_query.lock().unwrap().clone().unwrap();
    assert!(query.start.is_none());
    assert!(query.bucket.is_some());
}

#[tokio::test]
async fn record_without_device_tag_is_skipped() {
    // ---
    let untagged = Record::new()
        .with(TIME_KEY, FieldValue::Time(ts(50)))
        .with("temp", FieldValue::I64(99));
    let store = ScriptedStore::new(vec![
        Ok(untagged),
        Ok(record("wwn-a", 100, 40)),
        Ok(record("wwn-b", 100, 30)),
    ]);

    let history = assert_ok!(get_history(&store, "month", &CancellationToken::new()).await);
    assert_eq!(history.keys().collect::<Vec<_>>(), vec!["wwn-a", "wwn-b"]);
    assert!(history.values().all(|samples| samples.len() == 1));
}

#[tokio::test]
async fn missing_temperature_fails_with_partial_result() {
    // ---
    let broken = Record::new()
        .with("device_id", FieldValue::Text("wwn-b".into()))
        .with(TIME_KEY, FieldValue::Time(ts(100)));
    let store = ScriptedStore::new(vec![
        Ok(record("wwn-a", 100, 40)),
        Ok(record("wwn-a", 200, 41)),
        Ok(broken),
        Ok(record("wwn-b", 200, 31)),
    ]);

    let err = assert_err!(get_history(&store, "year", &CancellationToken::new()).await);
    assert!(matches!(err.kind, TemperatureError::Decode(_)));

    // Decoded before the fault, nothing after it
    assert_eq!(err.partial.len(), 1);
    assert_eq!(err.partial["wwn-a"].len(), 2);
    assert!(!err.partial.contains_key("wwn-b"));
}

#[tokio::test]
async fn mid_stream_error_keeps_decoded_records() {
    // ---
    let store = ScriptedStore::new(vec![
        Ok(record("wwn-a", 100, 40)),
        Err(StoreError::Unavailable("connection reset".into())),
        Ok(record("wwn-a", 200, 41)),
    ]);

    let err = assert_err!(get_history(&store, "week", &CancellationToken::new()).await);
    assert!(matches!(err.kind, TemperatureError::QueryFailure(_)));
    assert_eq!(err.partial["wwn-a"].len(), 1);
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn query_that_cannot_start_is_a_query_failure() {
    // ---
    let store = ScriptedStore::failing();
    let err = assert_err!(get_history(&store, "week", &CancellationToken::new()).await);
    assert!(matches!(err.kind, TemperatureError::QueryFailure(_)));
    assert!(err.partial.is_empty());
}

#[tokio::test]
async fn cancelled_read_reports_cancellation() {
    // ---
    let store = ScriptedStore::new(vec![Ok(record("wwn-a", 100, 40))]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = assert_err!(get_history(&store, "week", &cancel).await);
    assert!(matches!(err.kind, TemperatureError::Cancelled));
    assert_eq!(store.query_count(), 0);
}

/// Store whose queries never complete, or whose stream never yields.
struct StalledStore {
    stall_stream: bool,
}

#[async_trait]
impl TimeSeriesStore for StalledStore {
    async fn write_point(&self, _point: Point) -> Result<(), StoreError> {
        futures::future::pending().await
    }

    async fn query(&self, _query: HistoryQuery) -> Result<RecordStream, StoreError> {
        if self.stall_stream {
            let first = stream::iter(vec![Ok::<_, StoreError>(record("wwn-a", 100, 40))]);
            return Ok(first.chain(stream::pending()).boxed());
        }
        futures::future::pending().await
    }
}

fn cancel_after(ms: u64) -> CancellationToken {
    // ---
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        trigger.cancel();
    });
    cancel
}

#[tokio::test]
async fn cancelling_stalled_query_returns_cancelled() {
    // ---
    let store = StalledStore { stall_stream: false };
    let err = assert_err!(get_history(&store, "week", &cancel_after(50)).await);
    assert!(matches!(err.kind, TemperatureError::Cancelled));
    assert!(err.partial.is_empty());
}

#[tokio::test]
async fn cancelling_stalled_stream_keeps_decoded_records() {
    // ---
    let store = StalledStore { stall_stream: true };
    let err = assert_err!(get_history(&store, "week", &cancel_after(50)).await);
    assert!(matches!(err.kind, TemperatureError::Cancelled));
    assert_eq!(err.partial["wwn-a"].len(), 1);
}

#[tokio::test]
async fn mistyped_device_tag_is_a_decode_error() {
    // ---
    let numeric_tag = Record::new()
        .with("device_id", FieldValue::I64(5))
        .with(TIME_KEY, FieldValue::Time(ts(100)))
        .with("temp", FieldValue::I64(40));
    let store = ScriptedStore::new(vec![Ok(record("wwn-a", 50, 39)), Ok(numeric_tag)]);

    let err = assert_err!(get_history(&store, "week", &CancellationToken::new()).await);
    assert!(matches!(err.kind, TemperatureError::Decode(_)));
    assert_eq!(err.partial["wwn-a"].len(), 1);
}
