// rust/reader-core/src/config.rs

//! Configuration management for record readers.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ReaderError, Result};

// Top-level reader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub storage: StorageConfig,
    pub sources: Vec<SourceConfig>,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative source paths are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for buffered reads.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// On-disk layout of a record file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordFormatType {
    /// 4-byte big-endian length followed by the payload.
    #[default]
    LengthPrefixed,
    /// One record per line.
    Newline,
}

/// A single record source that consumers attach to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Logical name of the attachment point.
    pub name: String,
    /// Path of the underlying record store.
    pub source: String,
    /// Record layout of the store.
    pub format: RecordFormatType,
    /// Number of buffers in each consumer's queue pair.
    pub buffer_pool_size: usize,
    /// Visit records in a fresh random order on every pass.
    pub shuffle: bool,
    /// Seed for reproducible shuffling. Ignored unless `shuffle` is set.
    pub seed: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: String::new(),
            format: RecordFormatType::LengthPrefixed,
            buffer_pool_size: 4,
            shuffle: false,
            seed: None,
        }
    }
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Identity used to share one background reader between consumers.
    ///
    /// Includes the name so the same store can be read independently from
    /// two attachment points.
    pub fn source_key(&self) -> String {
        format!("{}:{}", self.name, self.source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ReaderError::config("source.name must not be empty"));
        }
        if self.source.is_empty() {
            return Err(ReaderError::config(format!(
                "source.source must not be empty (source '{}')",
                self.name
            )));
        }
        if self.buffer_pool_size == 0 {
            return Err(ReaderError::config(format!(
                "source.buffer_pool_size must be greater than 0 (source '{}')",
                self.name
            )));
        }
        Ok(())
    }
}

impl FromStr for ReaderConfig {
    type Err = ReaderError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ReaderError::config_with_source("failed to parse TOML config", e))
    }
}

impl ReaderConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReaderError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    /// Looks up a configured source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `RDR_`. Source-level
    // overrides apply to every configured source:
    // - `RDR_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `RDR_SOURCE_BUFFER_POOL_SIZE` overrides `sources[*].buffer_pool_size`
    // - `RDR_SOURCE_SHUFFLE` overrides `sources[*].shuffle`
    // - `RDR_SOURCE_SEED` overrides `sources[*].seed`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("RDR_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("RDR_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("RDR_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("RDR_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        let pool_size = std::env::var("RDR_SOURCE_BUFFER_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());
        let shuffle = std::env::var("RDR_SOURCE_SHUFFLE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok());
        let seed = std::env::var("RDR_SOURCE_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        for source in &mut self.sources {
            if let Some(v) = pool_size {
                source.buffer_pool_size = v;
            }
            if let Some(v) = shuffle {
                source.shuffle = v;
            }
            if let Some(v) = seed {
                source.seed = Some(v);
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(ReaderError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        for (i, source) in self.sources.iter().enumerate() {
            source.validate()?;
            if self.sources[..i].iter().any(|s| s.name == source.name) {
                return Err(ReaderError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }

        Ok(())
    }
}
