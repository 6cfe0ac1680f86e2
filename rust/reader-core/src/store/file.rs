// rust/reader-core/src/store/file.rs

//! Record files loaded through a storage backend.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::format::{format_for, RecordFormat};
use super::{RecordCursor, RecordStore, StoreOpener};
use crate::config::{SourceConfig, StorageConfig};
use crate::error::{ReaderError, Result};
use crate::storage::{LocalStorage, StorageBackend};

/// A record file held as one shared buffer, read into memory or mapped.
///
/// Record values handed out by cursors are slices of that buffer, so they
/// stay valid for as long as anyone holds them.
pub struct RecordFileStore {
    path: String,
    data: Bytes,
    format: Arc<dyn RecordFormat>,
}

impl RecordFileStore {
    /// Loads the record file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreOpen` if the file cannot be opened or read.
    pub fn open(
        storage: &dyn StorageBackend,
        path: &str,
        format: Arc<dyn RecordFormat>,
    ) -> Result<Self> {
        let mut reader = storage
            .open_read(Path::new(path))
            .map_err(|e| ReaderError::store_open_with_source(path, "failed to open record file", e))?;

        let size = usize::try_from(reader.size())
            .map_err(|_| ReaderError::store_open(path, "record file does not fit in memory"))?;
        let data = reader
            .read_range(0, size)
            .map_err(|e| ReaderError::store_open_with_source(path, "failed to read record file", e))?;

        debug!(path, size, format = format.name(), "loaded record file");

        Ok(Self::from_bytes(path, data, format))
    }

    /// Wraps bytes that already hold a record file.
    pub fn from_bytes(path: impl Into<String>, data: Bytes, format: Arc<dyn RecordFormat>) -> Self {
        Self {
            path: path.into(),
            data,
            format,
        }
    }
}

impl RecordStore for RecordFileStore {
    fn path(&self) -> &str {
        &self.path
    }

    fn cursor(&self) -> Result<Box<dyn RecordCursor>> {
        let mut cursor = FileCursor {
            path: self.path.clone(),
            data: self.data.clone(),
            format: self.format.clone(),
            start: 0,
            end: None,
        };
        cursor.seek_first()?;
        Ok(Box::new(cursor))
    }
}

struct FileCursor {
    path: String,
    data: Bytes,
    format: Arc<dyn RecordFormat>,
    start: usize,
    // End of the current record, None once past the last one
    end: Option<usize>,
}

impl FileCursor {
    fn locate(&self, offset: usize) -> Result<Option<usize>> {
        if offset >= self.data.len() {
            return Ok(None);
        }
        match self.format.find_record_end(&self.data, offset) {
            Some(end) => Ok(Some(end)),
            None => Err(ReaderError::store_fatal(format!(
                "truncated {} record at offset {} in '{}'",
                self.format.name(),
                offset,
                self.path
            ))),
        }
    }

    fn current_end(&self) -> Result<usize> {
        self.end.ok_or_else(|| {
            ReaderError::store_fatal(format!("cursor on '{}' is past the last record", self.path))
        })
    }
}

impl RecordCursor for FileCursor {
    fn valid(&self) -> bool {
        self.end.is_some()
    }

    fn key(&self) -> Result<Bytes> {
        self.current_end()?;
        Ok(Bytes::copy_from_slice(&(self.start as u64).to_be_bytes()))
    }

    fn value(&self) -> Result<Bytes> {
        let end = self.current_end()?;
        let (from, to) = self.format.payload(&self.data, self.start, end);
        Ok(self.data.slice(from..to))
    }

    fn advance(&mut self) -> Result<()> {
        if let Some(end) = self.end {
            self.start = end;
            self.end = self.locate(end)?;
        }
        Ok(())
    }

    fn seek_first(&mut self) -> Result<()> {
        self.start = 0;
        self.end = self.locate(0)?;
        Ok(())
    }
}

/// Opens record files through a storage backend, using each source's
/// configured format.
pub struct FileStoreOpener {
    storage: Arc<dyn StorageBackend>,
}

impl FileStoreOpener {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Opener backed by the local filesystem.
    pub fn local(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(LocalStorage::new(config)?)))
    }
}

impl StoreOpener for FileStoreOpener {
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn RecordStore>> {
        let store = RecordFileStore::open(
            self.storage.as_ref(),
            &config.source,
            format_for(config.format),
        )?;
        Ok(Box::new(store))
    }
}
