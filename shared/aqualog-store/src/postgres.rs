//! PostgreSQL-backed record store
//!
//! All partitions share one table keyed by `(partition_key, ts)`; metric
//! fields live in a JSONB column.

use aqualog_core::{AquaError, FieldValue, Page, QueryRange, Record, RecordPage, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::pool::PgPool;
use crate::store::{stamp_ingest_time, RecordStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sensor_records (
        partition_key TEXT NOT NULL,
        ts BIGINT NOT NULL,
        ingest_ms BIGINT NOT NULL,
        fields JSONB NOT NULL DEFAULT '{}'::jsonb,
        PRIMARY KEY (partition_key, ts)
    )
"#;

const INSERT: &str = r#"
    INSERT INTO sensor_records (partition_key, ts, ingest_ms, fields)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (partition_key, ts) DO NOTHING
"#;

// Total and page in one statement; an out-of-range page still yields the total row
const RANGE_PAGE: &str = r#"
    WITH matched AS (
        SELECT ts, ingest_ms, fields FROM sensor_records
        WHERE partition_key = $1 AND ts >= $2 AND ts <= $3
    )
    SELECT total.n, page.ts, page.ingest_ms, page.fields
    FROM (SELECT COUNT(*) AS n FROM matched) AS total
    LEFT JOIN LATERAL (
        SELECT ts, ingest_ms, fields FROM matched
        ORDER BY ts DESC OFFSET $4 LIMIT $5
    ) AS page ON TRUE
"#;

const COUNT_RANGE: &str = r#"
    SELECT COUNT(*) FROM sensor_records
    WHERE partition_key = $1 AND ts >= $2 AND ts <= $3
"#;

const LATEST: &str = r#"
    SELECT ts, ingest_ms, fields FROM sensor_records
    WHERE partition_key = $1
    ORDER BY ts DESC LIMIT $2
"#;

const SCAN: &str = r#"
    SELECT ts, ingest_ms, fields FROM sensor_records
    WHERE partition_key = $1 AND ts >= $2 AND ts <= $3
    ORDER BY ts ASC
"#;

const GET: &str = r#"
    SELECT ts, ingest_ms, fields FROM sensor_records
    WHERE partition_key = $1 AND ts = $2
"#;

/// Record store over a PostgreSQL wire-protocol database
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table when missing
    pub async fn migrate(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await.map_err(db_error)?;
        debug!("sensor_records schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: tokio_postgres::Error) -> AquaError {
    AquaError::Database(err.to_string())
}

fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn fields_to_json(record: &Record) -> Result<Value> {
    let mut map = Map::new();
    for (code, value) in record.fields() {
        map.insert(code.to_string(), serde_json::to_value(value)?);
    }
    Ok(Value::Object(map))
}

fn record_from_parts(ts: i64, ingest_ms: i64, fields: Value) -> Result<Record> {
    let mut record = Record::new(ts).with_ingest_ms(ingest_ms);
    if let Value::Object(map) = fields {
        for (code, value) in map {
            let value: FieldValue = serde_json::from_value(value)?;
            record.set(&code, value);
        }
    }
    Ok(record)
}

fn record_from_row(row: &tokio_postgres::Row) -> Result<Record> {
    record_from_parts(row.get(0), row.get(1), row.get(2))
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, record), fields(key = record.key))]
    async fn insert(&self, partition: &str, mut record: Record) -> Result<Record> {
        stamp_ingest_time(&mut record);
        let fields = fields_to_json(&record)?;
        let ingest_ms = record.ingest_ms.unwrap_or_default();

        let conn = self.pool.get().await?;
        let inserted = conn
            .execute(INSERT, &[&partition, &record.key, &ingest_ms, &fields])
            .await
            .map_err(db_error)?;

        if inserted == 0 {
            return Err(AquaError::DuplicateKey {
                partition: partition.to_string(),
                key: record.key,
            });
        }
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn range_query(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
        page: Page,
    ) -> Result<RecordPage> {
        if let Some(range) = range {
            range.validate()?;
        }
        let (start, end) = QueryRange::bounds_of(range);
        let (skip, limit) = (sql_count(page.skip), sql_count(page.limit));

        let conn = self.pool.get().await?;
        let rows = conn
            .query(RANGE_PAGE, &[&partition, &start, &end, &skip, &limit])
            .await
            .map_err(db_error)?;

        let mut result = RecordPage::empty();
        for row in &rows {
            let total: i64 = row.get(0);
            result.total = total as u64;

            let ts: Option<i64> = row.get(1);
            if let Some(ts) = ts {
                let ingest_ms: Option<i64> = row.get(2);
                let fields: Option<Value> = row.get(3);
                result.records.push(record_from_parts(
                    ts,
                    ingest_ms.unwrap_or_default(),
                    fields.unwrap_or(Value::Null),
                )?);
            }
        }
        Ok(result)
    }

    async fn count_range(&self, partition: &str, range: Option<&QueryRange>) -> Result<u64> {
        if let Some(range) = range {
            range.validate()?;
        }
        let (start, end) = QueryRange::bounds_of(range);

        let conn = self.pool.get().await?;
        let row = conn
            .query_one(COUNT_RANGE, &[&partition, &start, &end])
            .await
            .map_err(db_error)?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn latest(&self, partition: &str, n: usize) -> Result<Vec<Record>> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(LATEST, &[&partition, &sql_count(n)])
            .await
            .map_err(db_error)?;
        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn scan(&self, partition: &str, range: Option<&QueryRange>) -> Result<Vec<Record>> {
        if let Some(range) = range {
            range.validate()?;
        }
        let (start, end) = QueryRange::bounds_of(range);

        let conn = self.pool.get().await?;
        let rows = conn
            .query(SCAN, &[&partition, &start, &end])
            .await
            .map_err(db_error)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, partition: &str, key: i64) -> Result<Record> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(GET, &[&partition, &key])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => record_from_row(&row),
            None => Err(AquaError::NotFound(format!(
                "record {} in partition {}",
                key, partition
            ))),
        }
    }
}
