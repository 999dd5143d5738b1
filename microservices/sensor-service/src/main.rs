//! Sensor service process entry point

use std::sync::Arc;

use aqualog_calc::CalculatorConfig;
use aqualog_core::{AquaError, Result};
use aqualog_store::StaticDirectory;
use sensor_service::{SensorService, SensorServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SensorServiceConfig::from_env()?;
    let _telemetry = aqualog_telemetry::init(&config.service.service_name)
        .map_err(|e| AquaError::Config(e.to_string()))?;

    info!("Starting sensor service");

    let calculator = CalculatorConfig::from_env()?;
    // Group assignments are pushed in by the catalogue owner
    let directory = Arc::new(StaticDirectory::new());
    let service = SensorService::connect(&config, directory, calculator).await?;

    info!(
        fanout = config.fanout.concurrency,
        partition_timeout_ms = config.fanout.partition_timeout.as_millis() as u64,
        monthly_time_field = %config.monthly_time_field,
        "Sensor service ready"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AquaError::Config(format!("signal handler: {e}")))?;

    let metrics = service.fanout_metrics();
    info!(
        partition_failures = metrics.partition_failures.get(),
        omitted_partitions = metrics.omitted_partitions.get(),
        "Shutting down"
    );
    Ok(())
}
