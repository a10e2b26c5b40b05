//! Stage contract.
//!
//! A stage owns a compiled representation of one validated config. The
//! compiled state sits behind an `ArcSwap`: `process` loads it once per
//! batch, `configure` compiles a replacement off to the side and swaps it
//! in whole. A rejected config never touches the published state.

use std::fmt;

use crate::observability::metrics;
use crate::pipeline::error::{ConfigError, RecordError, StageError};
use crate::pipeline::record::{Batch, Record};
use crate::pipeline::stages::regex_drop::RegexDropConfig;
use crate::pipeline::stages::regex_replace::RegexReplaceConfig;

/// Stage-type-specific configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum StageConfig {
    RegexDrop(RegexDropConfig),
    RegexReplace(RegexReplaceConfig),
    /// Options for a stage type registered outside this crate.
    Raw(toml::Table),
}

impl StageConfig {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StageConfig::RegexDrop(_) => "regexdrop",
            StageConfig::RegexReplace(_) => "regexreplace",
            StageConfig::Raw(_) => "raw",
        }
    }
}

/// One unit of record filtering or transformation.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Stage type name.
    fn kind(&self) -> &'static str;

    /// Validate and commit a new configuration.
    ///
    /// On error the previously committed configuration keeps serving.
    fn configure(&self, config: StageConfig) -> Result<(), ConfigError>;

    /// Apply the stage to a batch.
    ///
    /// Absent slots are skipped. Records that fail individually are dropped;
    /// an `Err` means the stage itself is unusable.
    fn process(&self, batch: Batch) -> Result<Vec<Record>, StageError>;

    /// Release resources. Must be idempotent.
    fn close(&self) -> Result<(), StageError> {
        Ok(())
    }
}

/// Builds stages of one type from raw options.
pub trait StageFactory: Send + Sync {
    /// Map raw options onto a validated config.
    fn load_config(&self, options: &toml::Table) -> Result<StageConfig, ConfigError>;

    /// Construct a ready stage from a validated config.
    fn build(&self, config: StageConfig) -> Result<Box<dyn Stage>, ConfigError>;
}

/// Deserialize `options` into a typed stage config.
pub(crate) fn options_into<T>(stage: &'static str, options: &toml::Table) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    toml::Value::Table(options.clone())
        .try_into()
        .map_err(|source| ConfigError::Options { stage, source })
}

/// Run `f` over every present record, isolating per-record failures.
///
/// `Ok(None)` filters the record out; `Err` drops it and is counted.
pub(crate) fn process_isolated<F>(stage: &'static str, batch: Batch, mut f: F) -> Vec<Record>
where
    F: FnMut(Record) -> Result<Option<Record>, RecordError>,
{
    let mut out = Vec::with_capacity(batch.len());
    let mut filtered = 0usize;
    let mut failed = 0usize;

    for record in batch.into_iter().flatten() {
        match f(record) {
            Ok(Some(record)) => out.push(record),
            Ok(None) => filtered += 1,
            Err(e) => {
                failed += 1;
                tracing::debug!(stage, error = %e, "Record dropped");
            }
        }
    }

    if filtered > 0 {
        metrics::record_dropped(stage, "filtered", filtered);
    }
    if failed > 0 {
        metrics::record_dropped(stage, "error", failed);
    }
    out
}
