// rust/reader-core/src/store/mod.rs

//! Keyed record stores that background readers scan.
//!
//! A store is opened once per reader body and walked with a cursor that is
//! only ever touched by the body's own thread. Two stores are provided:
//! [`RecordFileStore`] for record files on a [`StorageBackend`] and
//! [`MemoryStore`] for records already held in memory.
//!
//! [`StorageBackend`]: crate::storage::StorageBackend

mod file;
mod format;
mod memory;

use bytes::Bytes;

use crate::config::SourceConfig;
use crate::error::Result;

pub use file::{FileStoreOpener, RecordFileStore};
pub use format::{format_for, LengthPrefixedFormat, NewlineDelimitedFormat, RecordFormat};
pub use memory::{MemoryStore, MemoryStoreOpener};

/// Position inside a record store.
///
/// A fresh cursor starts on the first record. Once `advance` moves past the
/// last record the cursor becomes invalid until `seek_first` is called.
pub trait RecordCursor: Send {
    /// Whether the cursor points at a record.
    fn valid(&self) -> bool;

    /// Key of the current record.
    fn key(&self) -> Result<Bytes>;

    /// Payload of the current record.
    fn value(&self) -> Result<Bytes>;

    /// Moves to the next record.
    fn advance(&mut self) -> Result<()>;

    /// Moves back to the first record.
    fn seek_first(&mut self) -> Result<()>;
}

/// An opened record store.
pub trait RecordStore: Send {
    /// Path the store was opened from.
    fn path(&self) -> &str;

    /// Opens a cursor positioned on the first record.
    fn cursor(&self) -> Result<Box<dyn RecordCursor>>;
}

/// Opens the store a source configuration points at.
pub trait StoreOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns `StoreOpen` if the path is invalid or unreadable.
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn RecordStore>>;
}
