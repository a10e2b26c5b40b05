//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml + overlay dir (*.toml, lexical order)
//!     → loader.rs (parse, merge overlays)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig (validated, immutable)
//!     → routing::build_route_table
//!
//! On change:
//!     watcher.rs observes filesystem events
//!     → debounced into one trigger per burst
//!     → reload::ReloadCoordinator rebuilds and publishes
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Overlays may add preprocessors and listeners, never redefine them

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigSource, LoadError};
pub use schema::{
    AdminConfig, AuthConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, PreprocessorConfig,
    ReloadConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{ConfigWatcher, WatcherError};
