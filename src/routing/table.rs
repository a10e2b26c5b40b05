//! Immutable route snapshot.
//!
//! A [`RouteTable`] is built once per configuration generation through a
//! [`RouteTableBuilder`] and never changes after that. Reconfiguration
//! builds a new table.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::StageError;
use crate::routing::error::BuildError;
use crate::routing::handler::Handler;

/// Listener protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Line-oriented HTTP.
    Std,
    /// HTTP Event Collector.
    Hec,
    /// Cloud log firehose.
    Firehose,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Std => "std",
            Protocol::Hec => "hec",
            Protocol::Firehose => "firehose",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a URL path lexically.
///
/// Repeated slashes collapse, `.` segments vanish, `..` removes the previous
/// segment, and any trailing slash is stripped. The result is always rooted.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Route identity: protocol family plus cleaned path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteKey {
    pub protocol: Protocol,
    pub path: String,
}

impl RouteKey {
    pub fn new(protocol: Protocol, path: &str) -> Self {
        Self {
            protocol,
            path: clean_path(path),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.path)
    }
}

/// One configuration generation's complete routing state.
#[derive(Debug)]
pub struct RouteTable {
    generation: u64,
    routes: HashMap<RouteKey, Arc<Handler>>,
    // cleaned request path -> key
    by_path: HashMap<String, RouteKey>,
    health_check: Option<String>,
}

impl RouteTable {
    /// A table with no routes, used before the first generation is built.
    pub fn empty() -> Self {
        RouteTableBuilder::new(0).build()
    }

    pub fn builder(generation: u64) -> RouteTableBuilder {
        RouteTableBuilder::new(generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn lookup(&self, key: &RouteKey) -> Option<&Arc<Handler>> {
        self.routes.get(key)
    }

    /// Resolve a raw request path.
    pub fn resolve(&self, path: &str) -> Option<&Arc<Handler>> {
        let key = self.by_path.get(&clean_path(path))?;
        self.routes.get(key)
    }

    /// Cleaned health-check path, if configured.
    pub fn health_check(&self) -> Option<&str> {
        self.health_check.as_deref()
    }

    pub fn is_health_check(&self, path: &str) -> bool {
        self.health_check
            .as_deref()
            .is_some_and(|hc| hc == clean_path(path))
    }

    /// Route keys in sorted order.
    pub fn route_keys(&self) -> Vec<&RouteKey> {
        let mut keys: Vec<&RouteKey> = self.routes.keys().collect();
        keys.sort();
        keys
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<Handler>> {
        self.routes.values()
    }

    /// Close every handler's chain, returning the failures.
    pub fn close(&self) -> Vec<StageError> {
        self.routes.values().flat_map(|h| h.close()).collect()
    }
}

/// Accumulates routes for a table that is not yet visible to anyone.
#[derive(Debug)]
pub struct RouteTableBuilder {
    generation: u64,
    routes: HashMap<RouteKey, Arc<Handler>>,
    by_path: HashMap<String, RouteKey>,
    health_check: Option<String>,
}

impl RouteTableBuilder {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            routes: HashMap::new(),
            by_path: HashMap::new(),
            health_check: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Set the health-check path. It must not shadow a route.
    pub fn set_health_check(&mut self, path: &str) -> Result<(), BuildError> {
        let cleaned = clean_path(path);
        if self.by_path.contains_key(&cleaned) {
            return Err(BuildError::HealthCheckConflict(cleaned));
        }
        self.health_check = Some(cleaned);
        Ok(())
    }

    /// Add a route. A path may be served by only one protocol family.
    pub fn insert(&mut self, key: RouteKey, handler: Handler) -> Result<(), BuildError> {
        if self.routes.contains_key(&key) {
            return Err(BuildError::DuplicateRoute(key));
        }
        if let Some(existing) = self.by_path.get(&key.path) {
            return Err(BuildError::PathConflict {
                path: key.path,
                existing: existing.protocol,
            });
        }
        if self.health_check.as_deref() == Some(key.path.as_str()) {
            return Err(BuildError::HealthCheckConflict(key.path));
        }
        self.by_path.insert(key.path.clone(), key.clone());
        self.routes.insert(key, Arc::new(handler));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            generation: self.generation,
            routes: self.routes,
            by_path: self.by_path,
            health_check: self.health_check,
        }
    }

    /// Discard a partially built table, closing what was constructed.
    pub fn abandon(self) {
        for err in self.build().close() {
            tracing::warn!(error = %err, "Failed to close abandoned stage");
        }
    }
}
