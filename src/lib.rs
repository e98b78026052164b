//! Drive temperature time-series: scan ingestion and aggregated history.
//!
//! The write path ([`writer::record_scan_temperature`]) expands one scan's
//! temperature data into tagged points; the read path
//! ([`reader::get_history`]) turns a duration key into an aggregation query
//! and decodes the result into per-device sample sequences. Both talk to
//! storage only through [`TimeSeriesStore`].

pub mod config;
pub mod duration;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod reader;
pub mod routes;
pub mod schema;
pub mod store;
pub mod writer;

pub use config::Config;
pub use duration::{DurationKey, DurationPolicy};
pub use error::{HistoryError, StoreError, TemperatureError};
pub use memory::MemoryStore;
pub use models::{CollectorScan, ScanTemperature, TemperatureHistory, TemperatureSample};
pub use postgres::PgStore;
pub use store::{FieldValue, HistoryQuery, Point, Record, RecordStream, TimeSeriesStore};
