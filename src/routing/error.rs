//! Route table construction errors.

use thiserror::Error;

use crate::pipeline::ConfigError;
use crate::routing::table::{Protocol, RouteKey};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("route {0} is already registered")]
    DuplicateRoute(RouteKey),

    #[error("path '{path}' is already served by a {existing} listener")]
    PathConflict { path: String, existing: Protocol },

    #[error("health check path '{0}' collides with a route")]
    HealthCheckConflict(String),

    #[error("{listener}: unknown preprocessor '{name}'")]
    UnknownPreprocessor { listener: String, name: String },

    #[error("preprocessor '{name}': {source}")]
    Stage {
        name: String,
        #[source]
        source: ConfigError,
    },
}
