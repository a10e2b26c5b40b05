//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber once at startup
//! - Select pretty or JSON output from `[observability]`
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - JSON format for production, pretty format for development

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("unknown log format '{0}', expected 'json' or 'pretty'")]
    LogFormat(String),

    #[error("failed to initialize tracing subscriber: {0}")]
    Subscriber(String),

    #[error("invalid metrics address '{address}': {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

/// Install the global tracing subscriber.
///
/// Must be called at most once per process; a second call fails.
pub fn init(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => return Err(ObservabilityError::LogFormat(other.to_string())),
    };

    result.map_err(|e| ObservabilityError::Subscriber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_rejected() {
        let config = ObservabilityConfig {
            log_format: "xml".into(),
            ..Default::default()
        };
        assert!(matches!(init(&config), Err(ObservabilityError::LogFormat(_))));
    }
}
