//! Configuration loading from disk.
//!
//! A config source is a main TOML file plus an optional directory of overlay
//! files. Overlays may only add preprocessors and listeners; a name that is
//! already defined is rejected.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::{GatewayConfig, OverlayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{section} '{name}' from {} is already defined", path.display())]
    Duplicate {
        section: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a configuration comes from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    overlay_dir: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overlay_dir: None,
        }
    }

    /// Override the overlay directory named in the file.
    pub fn with_overlay_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overlay_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overlay directory in effect for `config`.
    ///
    /// An explicit override wins; otherwise `reload.overlay_dir` is used,
    /// resolved against the config file's directory when relative.
    pub fn overlay_dir(&self, config: &GatewayConfig) -> Option<PathBuf> {
        if let Some(dir) = &self.overlay_dir {
            return Some(dir.clone());
        }
        let dir = config.reload.overlay_dir.as_ref()?;
        if dir.is_absolute() {
            return Some(dir.clone());
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(dir))
    }

    /// Read, merge, and validate the full configuration.
    pub fn load(&self) -> Result<GatewayConfig, LoadError> {
        let mut config: GatewayConfig = read_toml(&self.path)?;

        if let Some(dir) = self.overlay_dir(&config) {
            for file in overlay_files(&dir)? {
                let overlay: OverlayConfig = read_toml(&file)?;
                apply_overlay(&mut config, overlay, &file)?;
            }
        }

        validate_config(&config).map_err(LoadError::Validation)?;
        Ok(config)
    }
}

/// Load and validate configuration from a single TOML file plus any overlay
/// directory it names.
pub fn load_config(path: &Path) -> Result<GatewayConfig, LoadError> {
    ConfigSource::new(path).load()
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `*.toml` files directly inside `dir`, in lexical order.
fn overlay_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn apply_overlay(config: &mut GatewayConfig, overlay: OverlayConfig, file: &Path) -> Result<(), LoadError> {
    merge("preprocessor", &mut config.preprocessors, overlay.preprocessors, file)?;
    merge("std listener", &mut config.listeners.std, overlay.listeners.std, file)?;
    merge("hec listener", &mut config.listeners.hec, overlay.listeners.hec, file)?;
    merge(
        "firehose listener",
        &mut config.listeners.firehose,
        overlay.listeners.firehose,
        file,
    )
}

fn merge<T>(
    section: &'static str,
    base: &mut BTreeMap<String, T>,
    extra: BTreeMap<String, T>,
    file: &Path,
) -> Result<(), LoadError> {
    for (name, value) in extra {
        if base.contains_key(&name) {
            return Err(LoadError::Duplicate {
                section,
                name,
                path: file.to_path_buf(),
            });
        }
        base.insert(name, value);
    }
    Ok(())
}
