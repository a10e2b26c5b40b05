//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (listeners reference existing preprocessors)
//! - Validate value ranges (quiet period > 0, queue capacity > 0)
//! - Detect conflicting listener paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Stage options are checked later by the stage factories, at build time

use std::collections::HashMap;
use thiserror::Error;

use crate::config::schema::{AuthConfig, GatewayConfig};
use crate::routing::{clean_path, Protocol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{listener}: url '{url}' must start with '/'")]
    UrlNotRooted { listener: String, url: String },

    #[error("{listener}: url '{url}' is already used by {other}")]
    DuplicateUrl {
        listener: String,
        url: String,
        other: String,
    },

    #[error("{listener}: tag is required")]
    MissingTag { listener: String },

    #[error("{listener}: tag '{tag}' may only contain letters, digits, '-' and '_'")]
    InvalidTag { listener: String, tag: String },

    #[error("{listener}: {field} is required")]
    MissingField {
        listener: String,
        field: &'static str,
    },

    #[error("{listener}: unknown preprocessor '{name}'")]
    UnknownPreprocessor { listener: String, name: String },

    #[error("preprocessor '{0}': type is required")]
    MissingType(String),

    #[error("health check path '{0}' must start with '/'")]
    HealthCheckNotRooted(String),

    #[error("health check path '{path}' collides with {listener}")]
    HealthCheckCollision { path: String, listener: String },

    #[error("reload.quiet_period_ms must be greater than zero")]
    ZeroQuietPeriod,

    #[error("sink.capacity must be greater than zero")]
    ZeroSinkCapacity,

    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    LogFormat(String),

    #[error("admin.api_key is required when the admin API is enabled")]
    MissingAdminKey,
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.reload.quiet_period_ms == 0 {
        errors.push(ValidationError::ZeroQuietPeriod);
    }
    if config.sink.capacity == 0 {
        errors.push(ValidationError::ZeroSinkCapacity);
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::LogFormat(config.observability.log_format.clone()));
    }
    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    for (name, pre) in &config.preprocessors {
        if pre.kind.trim().is_empty() {
            errors.push(ValidationError::MissingType(name.clone()));
        }
    }

    let health = config.health_check().map(|path| {
        if !path.starts_with('/') {
            errors.push(ValidationError::HealthCheckNotRooted(path.to_string()));
        }
        (path, clean_path(path))
    });

    // cleaned path -> first listener that claimed it
    let mut claimed: HashMap<String, String> = HashMap::new();

    for listener in config.listeners.iter() {
        let label = listener_label(listener.protocol, listener.name);

        if !listener.url.starts_with('/') {
            errors.push(ValidationError::UrlNotRooted {
                listener: label.clone(),
                url: listener.url.to_string(),
            });
        }

        let path = clean_path(listener.url);
        if let Some(other) = claimed.get(&path) {
            errors.push(ValidationError::DuplicateUrl {
                listener: label.clone(),
                url: listener.url.to_string(),
                other: other.clone(),
            });
        } else {
            claimed.insert(path.clone(), label.clone());
        }

        if let Some((raw, health_path)) = &health {
            if *health_path == path {
                errors.push(ValidationError::HealthCheckCollision {
                    path: raw.to_string(),
                    listener: label.clone(),
                });
            }
        }

        if listener.tag.is_empty() {
            errors.push(ValidationError::MissingTag {
                listener: label.clone(),
            });
        } else if !is_valid_tag(listener.tag) {
            errors.push(ValidationError::InvalidTag {
                listener: label.clone(),
                tag: listener.tag.to_string(),
            });
        }

        for name in listener.preprocessors {
            if !config.preprocessors.contains_key(name) {
                errors.push(ValidationError::UnknownPreprocessor {
                    listener: label.clone(),
                    name: name.clone(),
                });
            }
        }
    }

    for (name, l) in &config.listeners.std {
        let listener = || listener_label(Protocol::Std, name);
        match &l.auth {
            AuthConfig::None => {}
            AuthConfig::Basic { username, .. } if username.is_empty() => {
                errors.push(ValidationError::MissingField {
                    listener: listener(),
                    field: "auth.username",
                });
            }
            AuthConfig::Basic { .. } => {}
            AuthConfig::Token { token } if token.is_empty() => {
                errors.push(ValidationError::MissingField {
                    listener: listener(),
                    field: "auth.token",
                });
            }
            AuthConfig::Token { .. } => {}
        }
    }
    for (name, l) in &config.listeners.hec {
        if l.token.is_empty() {
            errors.push(ValidationError::MissingField {
                listener: listener_label(Protocol::Hec, name),
                field: "token",
            });
        }
    }
    for (name, l) in &config.listeners.firehose {
        if l.access_key.is_empty() {
            errors.push(ValidationError::MissingField {
                listener: listener_label(Protocol::Firehose, name),
                field: "access_key",
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn listener_label(protocol: Protocol, name: &str) -> String {
    format!("listeners.{protocol}.{name}")
}

fn is_valid_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
