//! PostgreSQL-backed [`TimeSeriesStore`].
//!
//! Each measurement is a table with a `ts TIMESTAMPTZ` column, one `TEXT`
//! column per tag and one column per field (see `schema.rs`). Aggregated
//! queries bucket with `date_bin` anchored at the Unix epoch.

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{FieldValue, HistoryQuery, Point, Record, RecordStream, TimeSeriesStore, TIME_KEY};

// ---

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Table and column names are interpolated into SQL, so only plain
/// lowercase identifiers are accepted.
fn ident(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::Unsupported(format!("invalid identifier: {name:?}")))
    }
}

fn insert_sql(point: &Point) -> Result<String, StoreError> {
    // ---
    let mut columns = vec!["ts"];
    for k in point.tags.keys().chain(point.fields.keys()) {
        columns.push(ident(k)?);
    }
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident(&point.measurement)?,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

fn history_sql(query: &HistoryQuery) -> Result<String, StoreError> {
    // ---
    let table = ident(&query.measurement)?;
    let tag = ident(&query.group_by)?;
    let field = ident(&query.field)?;

    let sql = match query.bucket {
        None => format!(
            r#"
            SELECT {tag}, ts AS {TIME_KEY}, {field}
            FROM {table}
            WHERE ($1::timestamptz IS NULL OR ts >= $1)
            ORDER BY {tag}, ts ASC
            "#
        ),
        Some(_) => format!(
            r#"
            SELECT
                {tag},
                date_bin($2::float8 * INTERVAL '1 second', ts, TIMESTAMPTZ '1970-01-01 00:00:00+00') AS {TIME_KEY},
                ROUND(AVG({field}))::BIGINT AS {field}
            FROM {table}
            WHERE ($1::timestamptz IS NULL OR ts >= $1)
            GROUP BY {tag}, {TIME_KEY}
            ORDER BY {tag}, {TIME_KEY} ASC
            "#
        ),
    };
    Ok(sql)
}

fn row_to_record(row: &PgRow, tag: &str, field: &str) -> Result<Record, sqlx::Error> {
    // ---
    let mut record = Record::new().with(TIME_KEY, FieldValue::Time(row.try_get(TIME_KEY)?));
    if let Some(v) = row.try_get::<Option<String>, _>(tag)? {
        record = record.with(tag, FieldValue::Text(v));
    }
    if let Some(v) = row.try_get::<Option<i64>, _>(field)? {
        record = record.with(field, FieldValue::I64(v));
    }
    Ok(record)
}

#[async_trait]
impl TimeSeriesStore for PgStore {
    async fn write_point(&self, point: Point) -> Result<(), StoreError> {
        // ---
        let sql = insert_sql(&point)?;
        let mut q = sqlx::query(&sql).bind(point.time);
        for v in point.tags.values() {
            q = q.bind(v);
        }
        for v in point.fields.values() {
            q = match v {
                FieldValue::I64(v) => q.bind(*v),
                FieldValue::F64(v) => q.bind(*v),
                FieldValue::Bool(v) => q.bind(*v),
                FieldValue::Text(v) => q.bind(v),
                FieldValue::Time(v) => q.bind(*v),
            };
        }
        q.execute(&self.pool).await?;
        Ok(())
    }

    async fn query(&self, query: HistoryQuery) -> Result<RecordStream, StoreError> {
        // ---
        let sql = history_sql(&query)?;
        let bucket_secs = query.bucket.map(|b| b.num_seconds() as f64);
        debug!(table = %query.measurement, ?bucket_secs, "starting history query");

        let pool = self.pool.clone();
        let HistoryQuery {
            group_by,
            field,
            start,
            ..
        } = query;

        let records = async_stream::stream! {
            let mut q = sqlx::query(&sql).bind(start);
            if let Some(secs) = bucket_secs {
                q = q.bind(secs);
            }
            let mut rows = q.fetch(&pool);
            while let Some(row) = rows.next().await {
                yield row
                    .and_then(|row| row_to_record(&row, &group_by, &field))
                    .map_err(StoreError::from);
            }
        };

        Ok(records.boxed())
    }
}
