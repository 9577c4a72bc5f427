//! Subscriber setup for the `tracing` facade.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Calling this twice in one process is harmless; the second install is
/// ignored.
pub fn init_telemetry(config: &Config) {
    let env_filter = build_filter(&config.logging.level);

    let result = match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    if result.is_ok() {
        ::tracing::debug!(
            service = %config.service_name,
            format = ?config.logging.format,
            "Telemetry initialized"
        );
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
