// rust/reader-core/src/runtime.rs

//! Config-driven entry point.
//!
//! `Runtime` owns the storage backend described by a [`ReaderConfig`] and
//! opens [`DataReader`]s for the sources it lists.
//!
//! # Example
//!
//! ```no_run
//! use reader_core::Runtime;
//!
//! let runtime = Runtime::from_config_file("reader.toml").unwrap();
//! let reader = runtime.open("train").unwrap();
//!
//! let buffer = reader.full().pop().unwrap();
//! // Process the record
//! reader.free().push(buffer).unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::ReaderConfig;
use crate::error::{ReaderError, Result};
use crate::reader::DataReader;
use crate::storage::{LocalStorage, StorageBackend};
use crate::store::{FileStoreOpener, StoreOpener};

/// Opens readers for the sources of one configuration.
pub struct Runtime {
    config: ReaderConfig,
    storage: Arc<dyn StorageBackend>,
    opener: FileStoreOpener,
}

impl Runtime {
    /// Creates a runtime from a configuration file.
    ///
    /// The file is TOML. Environment variable overrides are applied after
    /// loading it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = ReaderConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend cannot be initialized.
    pub fn from_config(config: ReaderConfig) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let opener = FileStoreOpener::new(storage.clone());

        info!(
            base_path = %config.storage.base_path.display(),
            sources = config.sources.len(),
            "reader runtime ready"
        );

        Ok(Self {
            config,
            storage,
            opener,
        })
    }

    /// Attaches a new reader to the named source.
    ///
    /// # Errors
    ///
    /// Returns a config error if no source has that name, otherwise any
    /// error from [`DataReader::new`].
    pub fn open(&self, name: &str) -> Result<DataReader> {
        let source = self
            .config
            .source(name)
            .ok_or_else(|| ReaderError::config(format!("unknown source '{name}'")))?;
        DataReader::new(source, &self.opener)
    }

    /// Opener used for every source of this runtime.
    pub fn opener(&self) -> &dyn StoreOpener {
        &self.opener
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}
