//! Global `tracing` subscriber setup.

use tracing_subscriber::{fmt, layer::Layer, layer::SubscriberExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let env_filter = build_filter(&logging.level)?;

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ConfigError::Logging(format!("failed to install tracing subscriber: {}", e)))?;

    tracing_log::LogTracer::init()
        .map_err(|e| ConfigError::Logging(format!("failed to bridge log records: {}", e)))?;

    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| ConfigError::Logging(format!("invalid log level '{}': {}", level, e)))
}
