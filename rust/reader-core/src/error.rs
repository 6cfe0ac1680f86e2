// rust/reader-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to open store '{path}': {message}")]
    StoreOpen {
        path: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Source '{source_key}' contains no records")]
    EmptySource {
        source_key: String,
    },

    #[error("Failed to read record: {message}")]
    TransientRecord {
        message: String,
    },

    #[error("Unrecoverable store error: {message}")]
    StoreFatal {
        message: String,
    },

    #[error("Queue peer disconnected: {queue}")]
    Disconnected {
        queue: &'static str,
    },

    #[error("Reader for '{source_key}' is no longer running")]
    ReaderStopped {
        source_key: String,
    },

    #[error("Failed to spawn reader thread: {message}")]
    Thread {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReaderError>;

// Convenience constructors
impl ReaderError {

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn store_open(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreOpen {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn store_open_with_source(
        path: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreOpen {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn empty_source(source_key: impl Into<String>) -> Self {
        Self::EmptySource {
            source_key: source_key.into(),
        }
    }

    pub fn transient_record(message: impl Into<String>) -> Self {
        Self::TransientRecord {
            message: message.into(),
        }
    }

    pub fn store_fatal(message: impl Into<String>) -> Self {
        Self::StoreFatal {
            message: message.into(),
        }
    }

    pub fn disconnected(queue: &'static str) -> Self {
        Self::Disconnected { queue }
    }

    pub fn reader_stopped(source_key: impl Into<String>) -> Self {
        Self::ReaderStopped {
            source_key: source_key.into(),
        }
    }

    /// Returns true for errors the background loop absorbs and keeps running.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRecord { .. })
    }
}
