//! Subscriber installation

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.log_level`; exactly one of the JSON or plain
/// formatting layers is active.
pub fn init_tracing(service_name: &str, config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json = config.json_logs.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });
    let plain = (!config.json_logs).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    tracing::info!(
        service = service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("none"),
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_subscriber_installs_once() {
        let config = TelemetryConfig {
            json_logs: false,
            ..TelemetryConfig::default()
        };
        let _ = init_tracing("telemetry-test", &config);
        assert!(init_tracing("telemetry-test", &config).is_err());
    }
}
