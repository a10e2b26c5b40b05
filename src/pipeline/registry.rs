//! Stage registry.
//!
//! Maps a preprocessor type name to the factory that validates its options
//! and constructs stages. Populated at startup, read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::pipeline::error::ConfigError;
use crate::pipeline::stage::{Stage, StageConfig, StageFactory};
use crate::pipeline::stages::regex_drop::{RegexDropFactory, REGEX_DROP};
use crate::pipeline::stages::regex_replace::{RegexReplaceFactory, REGEX_REPLACE};

/// Registry of stage factories keyed by type name.
#[derive(Clone, Default)]
pub struct StageRegistry {
    factories: HashMap<String, Arc<dyn StageFactory>>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in stage type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(REGEX_DROP, Arc::new(RegexDropFactory));
        registry.register(REGEX_REPLACE, Arc::new(RegexReplaceFactory));
        registry
    }

    /// Register a factory. Type names are case-insensitive.
    pub fn register(&mut self, kind: impl Into<String>, factory: Arc<dyn StageFactory>) {
        let kind = kind.into().to_ascii_lowercase();
        debug!(kind = %kind, "Registered preprocessor type");
        self.factories.insert(kind, factory);
    }

    pub fn has(&self, kind: &str) -> bool {
        self.factories.contains_key(&kind.to_ascii_lowercase())
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    fn factory(&self, kind: &str) -> Result<&Arc<dyn StageFactory>, ConfigError> {
        self.factories
            .get(&kind.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::UnknownType(kind.to_string()))
    }

    /// Validate raw options for `kind`.
    pub fn load_config(&self, kind: &str, options: &toml::Table) -> Result<StageConfig, ConfigError> {
        self.factory(kind)?.load_config(options)
    }

    /// Validate raw options and construct a ready stage.
    pub fn build(&self, kind: &str, options: &toml::Table) -> Result<Box<dyn Stage>, ConfigError> {
        let factory = self.factory(kind)?;
        let config = factory.load_config(options)?;
        factory.build(config)
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
