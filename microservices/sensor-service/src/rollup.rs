//! Aggregation / rollup engine
//!
//! Daily reports read one partition and propagate its errors. Monthly
//! reports read many partitions and skip the ones that fail.

use std::collections::BTreeMap;
use std::sync::Arc;

use aqualog_core::{
    round2, DailyReport, MonthlyReport, QueryRange, Record, Result, KEY_FIELD, LEGACY_KEY_FIELD,
};
use aqualog_store::RecordStore;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::fanout::FanOut;

/// Running count / sum / min / max of one field
#[derive(Debug, Clone, Copy)]
struct FieldStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl FieldStats {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        round2(self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct DayBucket {
    records: u64,
    fields: BTreeMap<String, FieldStats>,
}

impl DayBucket {
    fn add(&mut self, record: &Record) {
        self.records += 1;
        for (code, value) in record.numeric_fields() {
            match self.fields.get_mut(code) {
                Some(stats) => stats.push(value),
                None => {
                    self.fields.insert(code.to_string(), FieldStats::new(value));
                }
            }
        }
    }

    fn into_report(self, date: NaiveDate) -> DailyReport {
        let mut report = DailyReport {
            date: date.format("%Y-%m-%d").to_string(),
            count: self.records,
            avg: BTreeMap::new(),
            min: BTreeMap::new(),
            max: BTreeMap::new(),
            counts: BTreeMap::new(),
        };
        for (code, stats) in self.fields {
            report.avg.insert(code.clone(), stats.avg());
            report.min.insert(code.clone(), round2(stats.min));
            report.max.insert(code.clone(), round2(stats.max));
            report.counts.insert(code, stats.count);
        }
        report
    }
}

/// Monthly rows plus the partitions that could not be read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRollup {
    pub rows: Vec<MonthlyReport>,
    pub omitted: Vec<String>,
}

#[derive(Default)]
struct MonthBucket {
    records: u64,
    /// (samples, sum) per requested metric
    metrics: BTreeMap<String, (u64, f64)>,
}

pub struct RollupEngine {
    store: Arc<dyn RecordStore>,
    fanout: FanOut,
    time_field: String,
}

impl RollupEngine {
    pub fn new(store: Arc<dyn RecordStore>, fanout: FanOut, time_field: impl Into<String>) -> Self {
        Self {
            store,
            fanout,
            time_field: time_field.into(),
        }
    }

    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    /// Per-day statistics of one partition, ascending by UTC date
    #[instrument(skip(self))]
    pub async fn daily_report(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
    ) -> Result<Vec<DailyReport>> {
        if let Some(range) = range {
            range.validate()?;
        }
        let records = self.store.scan(partition, range).await?;
        let reports = daily_buckets(&records);
        debug!(records = records.len(), days = reports.len(), "Daily report built");
        Ok(reports)
    }

    /// Per-(partition, year, month, metric) totals. Partitions are reported
    /// independently and concatenated in the order given.
    #[instrument(skip(self, partitions, metrics), fields(partitions = partitions.len()))]
    pub async fn monthly_report_by_metric(
        &self,
        partitions: &[String],
        metrics: &[String],
        deadline: Option<Instant>,
    ) -> MonthlyRollup {
        if partitions.is_empty() || metrics.is_empty() {
            return MonthlyRollup::default();
        }

        let (settled, omitted) = self
            .fanout
            .settle_all(partitions, deadline, |partition| {
                let store = Arc::clone(&self.store);
                async move { store.scan(&partition, None).await }
            })
            .await;

        let rows = settled
            .into_iter()
            .flat_map(|(partition, records)| {
                monthly_buckets(&partition, &records, metrics, &self.time_field)
            })
            .collect();
        MonthlyRollup { rows, omitted }
    }
}

fn daily_buckets(records: &[Record]) -> Vec<DailyReport> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for record in records {
        let Some(ts) = record.timestamp() else {
            debug!(
                key = record.key,
                "Key outside the calendar range, record left out of daily report"
            );
            continue;
        };
        days.entry(ts.date_naive()).or_default().add(record);
    }
    days.into_iter()
        .map(|(date, bucket)| bucket.into_report(date))
        .collect()
}

/// Epoch seconds a record is bucketed on; the key fields map to the record key
fn bucket_time(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    let secs = match field {
        KEY_FIELD | LEGACY_KEY_FIELD => record.key,
        _ => record.metric(field)? as i64,
    };
    DateTime::<Utc>::from_timestamp(secs, 0)
}

fn monthly_buckets(
    partition: &str,
    records: &[Record],
    metrics: &[String],
    time_field: &str,
) -> Vec<MonthlyReport> {
    let mut months: BTreeMap<(i32, u32), MonthBucket> = BTreeMap::new();
    for record in records {
        let Some(at) = bucket_time(record, time_field) else {
            continue;
        };
        let bucket = months.entry((at.year(), at.month())).or_default();
        bucket.records += 1;
        for metric in metrics {
            if let Some(value) = record.metric(metric) {
                let slot = bucket.metrics.entry(metric.clone()).or_insert((0, 0.0));
                slot.0 += 1;
                slot.1 += value;
            }
        }
    }

    let mut rows = Vec::new();
    for ((year, month), bucket) in months {
        for metric in metrics {
            let Some(&(samples, sum)) = bucket.metrics.get(metric) else {
                continue;
            };
            rows.push(MonthlyReport {
                partition: partition.to_string(),
                year,
                month,
                metric: metric.clone(),
                count: bucket.records,
                samples,
                total: round2(sum),
                avg: round2(sum / samples as f64),
            });
        }
    }
    rows
}
