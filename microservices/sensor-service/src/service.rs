//! Sensor service: ingest pipeline and query entry points

use std::sync::Arc;

use aqualog_calc::{CalculatorConfig, CalibrationSettings, DerivedMetricCalculator};
use aqualog_core::{DailyReport, Page, QueryRange, Record, RecordPage, Result, TaggedRecord};
use aqualog_store::{PartitionDirectory, PgPool, PgRecordStore, PoolConfig, RecordStore};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::SensorServiceConfig;
use crate::fanout::{FanOut, FanOutMetrics};
use crate::merger::{GroupLatest, QueryMerger};
use crate::rollup::{MonthlyRollup, RollupEngine};

/// Outcome of a bulk import, reported per record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: Vec<i64>,
    pub rejected: Vec<ImportRejection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRejection {
    pub key: i64,
    pub error_code: &'static str,
    pub message: String,
}

pub struct SensorService {
    store: Arc<dyn RecordStore>,
    directory: Arc<dyn PartitionDirectory>,
    calculator: Arc<DerivedMetricCalculator>,
    merger: QueryMerger,
    rollup: RollupEngine,
    fanout: FanOut,
}

impl SensorService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn PartitionDirectory>,
        calculator: Arc<DerivedMetricCalculator>,
        config: &SensorServiceConfig,
    ) -> Self {
        let fanout = FanOut::new(config.fanout.clone());
        Self {
            merger: QueryMerger::new(Arc::clone(&store), fanout.clone()),
            rollup: RollupEngine::new(
                Arc::clone(&store),
                fanout.clone(),
                config.monthly_time_field.clone(),
            ),
            store,
            directory,
            calculator,
            fanout,
        }
    }

    /// Build the service over the PostgreSQL store named by the configuration
    pub async fn connect(
        config: &SensorServiceConfig,
        directory: Arc<dyn PartitionDirectory>,
        calculator: CalculatorConfig,
    ) -> Result<Self> {
        let pool_config = PoolConfig {
            url: config.service.database_url.clone(),
            ..PoolConfig::from_env()?
        };
        let pool = PgPool::new(&pool_config)?;
        let warmed = pool.warm_up().await?;
        let rtt = pool.ping().await?;
        let store = PgRecordStore::new(pool);
        store.migrate().await?;

        let stats = store.pool().stats();
        info!(
            service = %config.service.service_name,
            warmed,
            rtt_ms = rtt.as_millis() as u64,
            max_size = stats.max_size,
            "Record store ready"
        );
        Ok(Self::new(
            Arc::new(store),
            directory,
            Arc::new(DerivedMetricCalculator::new(calculator)),
            config,
        ))
    }

    pub fn calculator(&self) -> &DerivedMetricCalculator {
        &self.calculator
    }

    pub fn fanout_metrics(&self) -> &FanOutMetrics {
        self.fanout.metrics()
    }

    /// Compute derived metrics, then persist
    #[instrument(skip(self, record), fields(key = record.key))]
    pub async fn add_record(&self, partition: &str, record: Record) -> Result<Record> {
        let record = self.calculator.compute(record);
        self.store.insert(partition, record).await
    }

    /// Ingest a batch; a rejected record does not stop the rest
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn import_records(&self, partition: &str, records: Vec<Record>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for record in records {
            let key = record.key;
            match self.add_record(partition, record).await {
                Ok(_) => summary.imported.push(key),
                Err(e) => {
                    warn!(partition, key, error = %e, "Import record rejected");
                    summary.rejected.push(ImportRejection {
                        key,
                        error_code: e.error_code(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            partition,
            imported = summary.imported.len(),
            rejected = summary.rejected.len(),
            "Import finished"
        );
        summary
    }

    pub async fn list_records(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
        page: Page,
    ) -> Result<RecordPage> {
        validate(range)?;
        self.store.range_query(partition, range, page).await
    }

    pub async fn count_records(&self, partition: &str, range: Option<&QueryRange>) -> Result<u64> {
        validate(range)?;
        self.store.count_range(partition, range).await
    }

    pub async fn latest_records(&self, partition: &str, n: usize) -> Result<Vec<Record>> {
        self.store.latest(partition, n).await
    }

    pub async fn get_record(&self, partition: &str, key: i64) -> Result<Record> {
        self.store.get(partition, key).await
    }

    /// Daily statistics of one partition
    pub async fn report_records(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
    ) -> Result<Vec<DailyReport>> {
        self.rollup.daily_report(partition, range).await
    }

    pub async fn list_records_by_group(
        &self,
        group_id: &str,
        range: Option<&QueryRange>,
        page: Page,
        deadline: Option<Instant>,
    ) -> Result<RecordPage<TaggedRecord>> {
        validate(range)?;
        let partitions = self.directory.partitions_for_group(group_id).await?;
        self.merger
            .list_by_group(&partitions, range, page, deadline)
            .await
    }

    pub async fn list_latest_by_group(
        &self,
        group_id: &str,
        deadline: Option<Instant>,
    ) -> Result<GroupLatest> {
        let partitions = self.directory.partitions_for_group(group_id).await?;
        Ok(self.merger.latest_by_group(&partitions, deadline).await)
    }

    pub async fn monthly_report(
        &self,
        partitions: &[String],
        metrics: &[String],
        deadline: Option<Instant>,
    ) -> MonthlyRollup {
        self.rollup
            .monthly_report_by_metric(partitions, metrics, deadline)
            .await
    }

    /// Validate and publish new calibration settings
    pub fn apply_calibration(&self, settings: &CalibrationSettings) -> Result<()> {
        settings.validate()?;
        self.calculator.apply_settings(settings);
        Ok(())
    }

    pub fn apply_calibration_json(&self, json: &str) -> Result<()> {
        let settings = CalibrationSettings::from_json(json)?;
        self.apply_calibration(&settings)
    }
}

fn validate(range: Option<&QueryRange>) -> Result<()> {
    range.map_or(Ok(()), QueryRange::validate)
}
