// rust/reader-core/src/storage/traits.rs

//! Storage abstraction traits used to load record stores.

use std::path::Path;

use bytes::Bytes;

use crate::error::Result;

/// A handle for reading from storage.
pub trait StorageReader: Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads a range of bytes from the object.
    ///
    /// Memory-mapped readers return a view of the mapping rather than a copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the range is out of bounds.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Bytes>;
}

/// Read access to stored objects.
///
/// Object-safe; record stores hold it as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Opens an object for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, is a directory, or
    /// cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;
}
