//! Regex filter stage.
//!
//! Default mode drops records whose payload matches and keeps the rest.
//! Inverted mode keeps only matching records.

use arc_swap::ArcSwap;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::pipeline::error::{ConfigError, StageError};
use crate::pipeline::record::{Batch, Record};
use crate::pipeline::stage::{options_into, process_isolated, Stage, StageConfig, StageFactory};

/// Stage type name used in configuration.
pub const REGEX_DROP: &str = "regexdrop";

/// Configuration for [`RegexDropper`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegexDropConfig {
    /// Pattern matched against the payload.
    pub regex: String,
    /// Keep matches instead of dropping them.
    pub invert: bool,
}

impl RegexDropConfig {
    pub fn new(regex: impl Into<String>, invert: bool) -> Self {
        Self {
            regex: regex.into(),
            invert,
        }
    }

    /// Check the pattern without keeping the compiled form.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<Regex, ConfigError> {
        if self.regex.is_empty() {
            return Err(ConfigError::MissingRegex);
        }
        Ok(Regex::new(&self.regex)?)
    }
}

#[derive(Debug)]
struct Compiled {
    rx: Regex,
    invert: bool,
}

/// Drops records by payload match.
#[derive(Debug)]
pub struct RegexDropper {
    compiled: ArcSwap<Compiled>,
}

impl RegexDropper {
    pub fn new(config: RegexDropConfig) -> Result<Self, ConfigError> {
        let rx = config.compile()?;
        Ok(Self {
            compiled: ArcSwap::from_pointee(Compiled {
                rx,
                invert: config.invert,
            }),
        })
    }
}

impl Stage for RegexDropper {
    fn kind(&self) -> &'static str {
        REGEX_DROP
    }

    fn configure(&self, config: StageConfig) -> Result<(), ConfigError> {
        let StageConfig::RegexDrop(config) = config else {
            return Err(ConfigError::WrongType {
                stage: REGEX_DROP,
                got: config.kind(),
            });
        };
        let rx = config.compile()?;
        self.compiled.store(Arc::new(Compiled {
            rx,
            invert: config.invert,
        }));
        Ok(())
    }

    fn process(&self, batch: Batch) -> Result<Vec<Record>, StageError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let compiled = self.compiled.load_full();
        Ok(process_isolated(REGEX_DROP, batch, |record| {
            if compiled.rx.is_match(record.data()) == compiled.invert {
                Ok(Some(record))
            } else {
                Ok(None)
            }
        }))
    }
}

/// Factory registered under [`REGEX_DROP`].
#[derive(Debug, Default)]
pub struct RegexDropFactory;

impl StageFactory for RegexDropFactory {
    fn load_config(&self, options: &toml::Table) -> Result<StageConfig, ConfigError> {
        let config: RegexDropConfig = options_into(REGEX_DROP, options)?;
        config.validate()?;
        Ok(StageConfig::RegexDrop(config))
    }

    fn build(&self, config: StageConfig) -> Result<Box<dyn Stage>, ConfigError> {
        match config {
            StageConfig::RegexDrop(config) => Ok(Box::new(RegexDropper::new(config)?)),
            other => Err(ConfigError::WrongType {
                stage: REGEX_DROP,
                got: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::regex_replace::RegexReplaceConfig;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::SystemTime;

    fn batch(payloads: &[&str]) -> Batch {
        payloads
            .iter()
            .map(|p| {
                Some(Record::new(
                    "test",
                    IpAddr::V4(Ipv4Addr::LOCALHOST),
                    SystemTime::now(),
                    p.to_string(),
                ))
            })
            .collect()
    }

    fn payloads(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| String::from_utf8_lossy(r.data()).into_owned())
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(RegexDropConfig::new("drop", false).validate().is_ok());
        assert!(matches!(
            RegexDropConfig::new("", false).validate(),
            Err(ConfigError::MissingRegex)
        ));
        assert!(matches!(
            RegexDropConfig::new("[", false).validate(),
            Err(ConfigError::InvalidRegex(_))
        ));
        assert!(RegexDropper::new(RegexDropConfig::new("(", false)).is_err());
    }

    #[test]
    fn test_drops_matches() {
        let stage = RegexDropper::new(RegexDropConfig::new("drop", false)).unwrap();
        let out = stage.process(batch(&["keep", "please drop", "keep2"])).unwrap();
        assert_eq!(payloads(&out), vec!["keep", "keep2"]);
    }

    #[test]
    fn test_invert_is_complement() {
        let input = ["keep", "please drop", "keep2", "drop it", "other"];
        let normal = RegexDropper::new(RegexDropConfig::new("drop", false)).unwrap();
        let inverted = RegexDropper::new(RegexDropConfig::new("drop", true)).unwrap();

        let kept = payloads(&normal.process(batch(&input)).unwrap());
        let kept_inv = payloads(&inverted.process(batch(&input)).unwrap());

        assert_eq!(kept_inv, vec!["please drop", "drop it"]);
        assert_eq!(kept.len() + kept_inv.len(), input.len());
        assert!(kept.iter().all(|p| !kept_inv.contains(p)));
    }

    #[test]
    fn test_no_matches_and_all_match() {
        let stage = RegexDropper::new(RegexDropConfig::new("xyz", false)).unwrap();
        assert_eq!(stage.process(batch(&["a", "b"])).unwrap().len(), 2);

        let stage = RegexDropper::new(RegexDropConfig::new(".*", false)).unwrap();
        assert!(stage.process(batch(&["a", "b"])).unwrap().is_empty());
    }

    #[test]
    fn test_placeholders_skipped() {
        for invert in [false, true] {
            let stage = RegexDropper::new(RegexDropConfig::new("x", invert)).unwrap();
            let mut input = batch(&["x1", "y1"]);
            input.insert(0, None);
            input.insert(2, None);
            input.push(None);

            let out = stage.process(input).unwrap();
            assert_eq!(out.len(), 1);
        }
    }

    #[test]
    fn test_empty_batch_and_empty_payload() {
        let stage = RegexDropper::new(RegexDropConfig::new("^$", false)).unwrap();
        assert!(stage.process(Vec::new()).unwrap().is_empty());
        assert_eq!(payloads(&stage.process(batch(&["", "a"])).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_case_insensitive_flag_in_pattern() {
        let stage = RegexDropper::new(RegexDropConfig::new("(?i)error", false)).unwrap();
        let out = stage.process(batch(&["ERROR: x", "Error y", "info z"])).unwrap();
        assert_eq!(payloads(&out), vec!["info z"]);
    }

    #[test]
    fn test_json_payloads() {
        let stage = RegexDropper::new(RegexDropConfig::new(r#""level":"debug""#, false)).unwrap();
        let out = stage
            .process(batch(&[
                r#"{"level":"debug","msg":"a"}"#,
                r#"{"level":"error","msg":"b"}"#,
            ]))
            .unwrap();
        assert_eq!(payloads(&out), vec![r#"{"level":"error","msg":"b"}"#]);
    }

    #[test]
    fn test_configure_update() {
        let stage = RegexDropper::new(RegexDropConfig::new("old", false)).unwrap();
        stage
            .configure(StageConfig::RegexDrop(RegexDropConfig::new("new", true)))
            .unwrap();
        let out = stage.process(batch(&["old", "new"])).unwrap();
        assert_eq!(payloads(&out), vec!["new"]);
    }

    #[test]
    fn test_rejected_configure_keeps_previous() {
        let stage = RegexDropper::new(RegexDropConfig::new("drop", false)).unwrap();

        assert!(stage
            .configure(StageConfig::RegexDrop(RegexDropConfig::new("", false)))
            .is_err());
        assert!(stage
            .configure(StageConfig::RegexDrop(RegexDropConfig::new("[", true)))
            .is_err());
        let wrong = StageConfig::RegexReplace(RegexReplaceConfig::new("a", "b", true));
        assert!(matches!(
            stage.configure(wrong),
            Err(ConfigError::WrongType { .. })
        ));

        let out = stage.process(batch(&["keep", "drop"])).unwrap();
        assert_eq!(payloads(&out), vec!["keep"]);
    }

    #[test]
    fn test_rejected_configure_races_process() {
        let stage = RegexDropper::new(RegexDropConfig::new("drop", false)).unwrap();
        let input = ["keep", "please drop", "keep2"];

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..500 {
                    let bad = if i % 2 == 0 { "" } else { "(unclosed" };
                    let res = stage.configure(StageConfig::RegexDrop(RegexDropConfig::new(bad, true)));
                    assert!(res.is_err());
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..500 {
                        let out = stage.process(batch(&input)).unwrap();
                        assert_eq!(payloads(&out), vec!["keep", "keep2"]);
                    }
                });
            }
        });
    }

    #[test]
    fn test_factory_loads_options() {
        let options: toml::Table = toml::from_str("regex = 'debug'\ninvert = true").unwrap();
        let config = RegexDropFactory.load_config(&options).unwrap();
        assert_eq!(
            config,
            StageConfig::RegexDrop(RegexDropConfig::new("debug", true))
        );

        let empty = toml::Table::new();
        assert!(matches!(
            RegexDropFactory.load_config(&empty),
            Err(ConfigError::MissingRegex)
        ));

        let unknown: toml::Table = toml::from_str("regex = 'a'\npattern = 'b'").unwrap();
        assert!(matches!(
            RegexDropFactory.load_config(&unknown),
            Err(ConfigError::Options { .. })
        ));
    }
}
