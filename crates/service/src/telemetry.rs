//! Log subscriber and metrics recorder setup.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};
use crate::error::{Result, ServiceError};

/// Installs the global tracing subscriber.
///
/// The filter comes from `config.log_level` (`RUST_LOG` syntax). Fails if the
/// directive does not parse or a subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| ServiceError::Config(format!("invalid RUST_LOG '{}': {e}", config.log_level)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    result.map_err(|e| ServiceError::Telemetry(e.to_string()))
}

/// Installs the global Prometheus recorder and returns the handle used to
/// render the scrape output.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServiceError::Telemetry(e.to_string()))
}
