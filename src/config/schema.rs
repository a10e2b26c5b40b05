//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::routing::Protocol;

/// Root configuration for the ingest gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Path answered with 200 for load balancer probes.
    pub health_check_path: Option<String>,

    /// HTTP listener settings (bind address, limits).
    pub listener: ListenerConfig,

    /// Sink queue settings.
    pub sink: SinkConfig,

    /// Hot reload settings.
    pub reload: ReloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// Named preprocessor definitions referenced by listeners.
    pub preprocessors: BTreeMap<String, PreprocessorConfig>,

    /// Listener definitions by protocol family.
    pub listeners: ListenersConfig,
}

impl GatewayConfig {
    /// Health-check path, if one is set.
    pub fn health_check(&self) -> Option<&str> {
        self.health_check_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 8 * 1024 * 1024, // 8MB
            request_timeout_secs: 30,
        }
    }
}

/// Sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Batches queued before ingest requests see backpressure.
    pub capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Hot reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch the config file and overlay directory for changes.
    pub watch: bool,

    /// Directory of overlay files; relative paths resolve against the config file.
    pub overlay_dir: Option<PathBuf>,

    /// Quiet period after the last change before reloading, in milliseconds.
    pub quiet_period_ms: u64,

    /// Upper bound on how long a superseded generation waits for in-flight requests.
    pub retire_grace_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            watch: true,
            overlay_dir: None,
            quiet_period_ms: 1000,
            retire_grace_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// One named preprocessor: its type plus type-specific options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreprocessorConfig {
    /// Registered stage type (e.g. "regexdrop").
    #[serde(rename = "type")]
    pub kind: String,

    /// Everything else in the table, handed to the stage factory.
    #[serde(flatten)]
    pub options: toml::Table,
}

/// Listener definitions grouped by protocol family.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenersConfig {
    pub std: BTreeMap<String, StdListenerConfig>,
    pub hec: BTreeMap<String, HecListenerConfig>,
    pub firehose: BTreeMap<String, FirehoseListenerConfig>,
}

/// Protocol-independent view of one listener.
#[derive(Debug, Clone, Copy)]
pub struct ListenerView<'a> {
    pub protocol: Protocol,
    pub name: &'a str,
    pub url: &'a str,
    pub tag: &'a str,
    pub preprocessors: &'a [String],
}

impl ListenersConfig {
    /// Every listener across all families, std first.
    pub fn iter(&self) -> impl Iterator<Item = ListenerView<'_>> {
        let std = self.std.iter().map(|(name, l)| ListenerView {
            protocol: Protocol::Std,
            name,
            url: &l.url,
            tag: &l.tag,
            preprocessors: &l.preprocessors,
        });
        let hec = self.hec.iter().map(|(name, l)| ListenerView {
            protocol: Protocol::Hec,
            name,
            url: &l.url,
            tag: &l.tag,
            preprocessors: &l.preprocessors,
        });
        let firehose = self.firehose.iter().map(|(name, l)| ListenerView {
            protocol: Protocol::Firehose,
            name,
            url: &l.url,
            tag: &l.tag,
            preprocessors: &l.preprocessors,
        });
        std.chain(hec).chain(firehose)
    }

    pub fn len(&self) -> usize {
        self.std.len() + self.hec.len() + self.firehose.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Line-oriented HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StdListenerConfig {
    /// Route path.
    pub url: String,

    /// Tag applied to every record.
    pub tag: String,

    /// Preprocessor names, applied in order.
    #[serde(default)]
    pub preprocessors: Vec<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP Event Collector listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HecListenerConfig {
    #[serde(default = "default_hec_url")]
    pub url: String,

    pub tag: String,

    /// Token expected in `Authorization: Splunk <token>`.
    pub token: String,

    #[serde(default)]
    pub preprocessors: Vec<String>,
}

fn default_hec_url() -> String {
    "/services/collector/event".to_string()
}

/// Cloud log-firehose listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FirehoseListenerConfig {
    pub url: String,

    pub tag: String,

    /// Key expected in `X-Amz-Firehose-Access-Key`.
    pub access_key: String,

    #[serde(default)]
    pub preprocessors: Vec<String>,
}

/// Authentication for std listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic { username: String, password: String },
    Token { token: String },
}

/// Sections an overlay file may contribute.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub preprocessors: BTreeMap<String, PreprocessorConfig>,
    pub listeners: ListenersConfig,
}
