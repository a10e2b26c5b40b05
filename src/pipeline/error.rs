//! Pipeline error definitions.

use thiserror::Error;

/// A stage configuration was rejected.
///
/// Returned from stage construction and reconfiguration. A stage that
/// returns this keeps serving its previous configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The pattern is empty or missing.
    #[error("regex is required")]
    MissingRegex,

    /// The pattern does not compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// The config variant belongs to another stage type.
    #[error("invalid configuration for {stage}: got {got} config")]
    WrongType { stage: &'static str, got: &'static str },

    /// No factory registered for the stage type.
    #[error("unknown preprocessor type '{0}'")]
    UnknownType(String),

    /// Options could not be mapped onto the stage's config.
    #[error("malformed options for {stage}: {source}")]
    Options {
        stage: &'static str,
        #[source]
        source: toml::de::Error,
    },
}

/// A single record could not be processed.
///
/// Never escapes a stage; the record is dropped from its batch.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload of {size} bytes exceeds maximum of {max}")]
    Oversized { size: usize, max: usize },
}

/// Stage-level systemic failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{stage}' failed: {reason}")]
    Failed { stage: String, reason: String },

    #[error("stage '{0}' is closed")]
    Closed(String),
}
