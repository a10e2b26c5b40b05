//! Ordered composition of stages.

use crate::pipeline::error::StageError;
use crate::pipeline::record::{Batch, Record};
use crate::pipeline::stage::Stage;

/// A stage bound to the preprocessor name it was configured under.
#[derive(Debug)]
struct Link {
    name: String,
    stage: Box<dyn Stage>,
}

/// Stages applied in order; the output of one is the input of the next.
///
/// A chain is built once per configuration generation and never mutated.
/// Reconfiguration builds a new chain.
#[derive(Debug, Default)]
pub struct Chain {
    links: Vec<Link>,
}

impl Chain {
    /// An empty chain passes every present record through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn push(&mut self, name: impl Into<String>, stage: Box<dyn Stage>) {
        self.links.push(Link {
            name: name.into(),
            stage,
        });
    }

    /// Builder form of [`Chain::push`].
    pub fn with_stage(mut self, name: impl Into<String>, stage: Box<dyn Stage>) -> Self {
        self.push(name, stage);
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Preprocessor names in application order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|l| l.name.as_str())
    }

    /// Thread a batch through every stage.
    ///
    /// An empty intermediate result is still offered to later stages.
    pub fn process(&self, batch: Batch) -> Result<Vec<Record>, StageError> {
        let mut current = batch;

        for (i, link) in self.links.iter().enumerate() {
            let output = link.stage.process(current).map_err(|e| match e {
                StageError::Failed { reason, .. } => StageError::Failed {
                    stage: link.name.clone(),
                    reason,
                },
                StageError::Closed(_) => StageError::Closed(link.name.clone()),
            })?;
            if i + 1 == self.links.len() {
                return Ok(output);
            }
            current = output.into_iter().map(Some).collect();
        }

        // no stages
        Ok(current.into_iter().flatten().collect())
    }

    /// Close every stage, returning the failures.
    pub fn close(&self) -> Vec<StageError> {
        self.links
            .iter()
            .filter_map(|link| link.stage.close().err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::ConfigError;
    use crate::pipeline::stage::StageConfig;
    use crate::pipeline::stages::regex_drop::{RegexDropConfig, RegexDropper};
    use crate::pipeline::stages::regex_replace::{RegexReplaceConfig, RegexReplacer};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::SystemTime;

    /// Counts how often it is offered a batch, and emits `inject` records.
    #[derive(Debug, Default)]
    struct Probe {
        calls: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        inject: Option<&'static str>,
        fail: bool,
    }

    impl Stage for Probe {
        fn kind(&self) -> &'static str {
            "probe"
        }

        fn configure(&self, _config: StageConfig) -> Result<(), ConfigError> {
            Ok(())
        }

        fn process(&self, batch: Batch) -> Result<Vec<Record>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StageError::Failed {
                    stage: "probe".into(),
                    reason: "boom".into(),
                });
            }
            let mut out: Vec<Record> = batch.into_iter().flatten().collect();
            if let Some(data) = self.inject {
                out.push(record(data));
            }
            Ok(out)
        }

        fn close(&self) -> Result<(), StageError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(data: &str) -> Record {
        Record::new("t", IpAddr::V4(Ipv4Addr::LOCALHOST), SystemTime::now(), data.to_string())
    }

    fn batch(payloads: &[&str]) -> Batch {
        payloads.iter().map(|p| Some(record(p))).collect()
    }

    fn payloads(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| String::from_utf8_lossy(r.data()).into_owned())
            .collect()
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let chain = Chain::new();
        let out = chain.process(vec![Some(record("a")), None, Some(record("b"))]).unwrap();
        assert_eq!(payloads(&out), vec!["a", "b"]);
    }

    #[test]
    fn test_stages_apply_in_order() {
        let replace_then_drop = Chain::new()
            .with_stage(
                "scrub",
                Box::new(RegexReplacer::new(RegexReplaceConfig::new(r"\d+", "N", true)).unwrap()),
            )
            .with_stage(
                "nonum",
                Box::new(RegexDropper::new(RegexDropConfig::new(r"\d", false)).unwrap()),
            );
        let out = replace_then_drop.process(batch(&["id 1", "id 2"])).unwrap();
        assert_eq!(payloads(&out), vec!["id N", "id N"]);

        let drop_then_replace = Chain::new()
            .with_stage(
                "nonum",
                Box::new(RegexDropper::new(RegexDropConfig::new(r"\d", false)).unwrap()),
            )
            .with_stage(
                "scrub",
                Box::new(RegexReplacer::new(RegexReplaceConfig::new(r"\d+", "N", true)).unwrap()),
            );
        let out = drop_then_replace.process(batch(&["id 1", "plain"])).unwrap();
        assert_eq!(payloads(&out), vec!["plain"]);
        assert_eq!(drop_then_replace.names().collect::<Vec<_>>(), vec!["nonum", "scrub"]);
    }

    #[test]
    fn test_empty_result_still_offered_downstream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = Chain::new()
            .with_stage(
                "dropall",
                Box::new(RegexDropper::new(RegexDropConfig::new(".*", false)).unwrap()),
            )
            .with_stage(
                "inject",
                Box::new(Probe {
                    calls: calls.clone(),
                    inject: Some("injected"),
                    ..Default::default()
                }),
            );

        let out = chain.process(batch(&["a", "b"])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(payloads(&out), vec!["injected"]);
    }

    #[test]
    fn test_stage_failure_names_link() {
        let chain = Chain::new().with_stage(
            "broken",
            Box::new(Probe {
                fail: true,
                ..Default::default()
            }),
        );
        let err = chain.process(batch(&["a"])).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_close_reaches_every_stage() {
        let closes = Arc::new(AtomicUsize::new(0));
        let chain = Chain::new()
            .with_stage(
                "a",
                Box::new(Probe {
                    closes: closes.clone(),
                    ..Default::default()
                }),
            )
            .with_stage(
                "b",
                Box::new(Probe {
                    closes: closes.clone(),
                    ..Default::default()
                }),
            );
        assert!(chain.close().is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
