//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RuntimeConfig;
use crate::error::TelemetryError;

/// Installs the global subscriber.
///
/// The filter comes from `log_level`, then `RUST_LOG`, then `info`. JSON
/// output is meant for containers; the default is a compact human format.
pub fn init_tracing(config: &RuntimeConfig) -> Result<(), TelemetryError> {
    let env_filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| TelemetryError::Filter(e.to_string()))?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .map_err(|e| TelemetryError::Filter(e.to_string()))?,
    };

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    }

    tracing::info!(node = %config.node, json = config.json_logs, "Tracing initialized");
    Ok(())
}
