//! Regex rewrite stage.
//!
//! Every non-overlapping match in the payload is replaced using a template
//! that may reference capture groups as `$1` or `${name}`. Each input
//! record yields exactly one output record unless the rewrite fails.

use arc_swap::ArcSwap;
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

use crate::pipeline::error::{ConfigError, RecordError, StageError};
use crate::pipeline::record::{Batch, Record};
use crate::pipeline::stage::{options_into, process_isolated, Stage, StageConfig, StageFactory};

/// Stage type name used in configuration.
pub const REGEX_REPLACE: &str = "regexreplace";

/// Configuration for [`RegexReplacer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegexReplaceConfig {
    pub regex: String,
    /// Replacement template.
    pub replacement: String,
    /// Match letter case exactly. Off by default.
    pub case_sensitive: bool,
}

impl RegexReplaceConfig {
    pub fn new(regex: impl Into<String>, replacement: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            regex: regex.into(),
            replacement: replacement.into(),
            case_sensitive,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<Regex, ConfigError> {
        if self.regex.is_empty() {
            return Err(ConfigError::MissingRegex);
        }
        Ok(RegexBuilder::new(&self.regex)
            .case_insensitive(!self.case_sensitive)
            .build()?)
    }
}

#[derive(Debug)]
struct Compiled {
    re: Regex,
    replacement: Vec<u8>,
}

/// Rewrites payloads by regex.
#[derive(Debug)]
pub struct RegexReplacer {
    compiled: ArcSwap<Compiled>,
}

impl RegexReplacer {
    pub fn new(config: RegexReplaceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            compiled: ArcSwap::from_pointee(Compiled::new(&config)?),
        })
    }
}

impl Compiled {
    fn new(config: &RegexReplaceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            re: config.compile()?,
            replacement: config.replacement.as_bytes().to_vec(),
        })
    }

    fn rewrite(&self, record: Record) -> Result<Record, RecordError> {
        if record.data().is_empty() {
            return Ok(record);
        }
        match self.re.replace_all(record.data(), self.replacement.as_slice()) {
            Cow::Borrowed(_) => Ok(record),
            Cow::Owned(data) => record.with_data(data),
        }
    }
}

impl Stage for RegexReplacer {
    fn kind(&self) -> &'static str {
        REGEX_REPLACE
    }

    fn configure(&self, config: StageConfig) -> Result<(), ConfigError> {
        let StageConfig::RegexReplace(config) = config else {
            return Err(ConfigError::WrongType {
                stage: REGEX_REPLACE,
                got: config.kind(),
            });
        };
        self.compiled.store(Arc::new(Compiled::new(&config)?));
        Ok(())
    }

    fn process(&self, batch: Batch) -> Result<Vec<Record>, StageError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let compiled = self.compiled.load_full();
        Ok(process_isolated(REGEX_REPLACE, batch, |record| {
            compiled.rewrite(record).map(Some)
        }))
    }
}

/// Factory registered under [`REGEX_REPLACE`].
#[derive(Debug, Default)]
pub struct RegexReplaceFactory;

impl StageFactory for RegexReplaceFactory {
    fn load_config(&self, options: &toml::Table) -> Result<StageConfig, ConfigError> {
        let config: RegexReplaceConfig = options_into(REGEX_REPLACE, options)?;
        config.validate()?;
        Ok(StageConfig::RegexReplace(config))
    }

    fn build(&self, config: StageConfig) -> Result<Box<dyn Stage>, ConfigError> {
        match config {
            StageConfig::RegexReplace(config) => Ok(Box::new(RegexReplacer::new(config)?)),
            other => Err(ConfigError::WrongType {
                stage: REGEX_REPLACE,
                got: other.kind(),
            }),
        }
    }
}
