// rust/reader-core/src/store/memory.rs

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::{RecordCursor, RecordStore, StoreOpener};
use crate::config::SourceConfig;
use crate::error::{ReaderError, Result};

/// Records held in memory, keyed by their index.
#[derive(Clone)]
pub struct MemoryStore {
    path: String,
    records: Arc<[Bytes]>,
}

impl MemoryStore {
    pub fn new<I, R>(path: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Bytes>,
    {
        Self {
            path: path.into(),
            records: records.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn path(&self) -> &str {
        &self.path
    }

    fn cursor(&self) -> Result<Box<dyn RecordCursor>> {
        Ok(Box::new(MemoryCursor {
            records: self.records.clone(),
            position: 0,
        }))
    }
}

struct MemoryCursor {
    records: Arc<[Bytes]>,
    position: usize,
}

impl MemoryCursor {
    fn current(&self) -> Result<&Bytes> {
        self.records
            .get(self.position)
            .ok_or_else(|| ReaderError::store_fatal("cursor is past the last record"))
    }
}

impl RecordCursor for MemoryCursor {
    fn valid(&self) -> bool {
        self.position < self.records.len()
    }

    fn key(&self) -> Result<Bytes> {
        self.current()?;
        Ok(Bytes::copy_from_slice(&(self.position as u64).to_be_bytes()))
    }

    fn value(&self) -> Result<Bytes> {
        self.current().cloned()
    }

    fn advance(&mut self) -> Result<()> {
        if self.valid() {
            self.position += 1;
        }
        Ok(())
    }

    fn seek_first(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// Serves in-memory stores by source path.
#[derive(Clone, Default)]
pub struct MemoryStoreOpener {
    stores: HashMap<String, MemoryStore>,
}

impl MemoryStoreOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store under its path.
    #[must_use]
    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.stores.insert(store.path.clone(), store);
        self
    }
}

impl StoreOpener for MemoryStoreOpener {
    fn open(&self, config: &SourceConfig) -> Result<Box<dyn RecordStore>> {
        self.stores
            .get(&config.source)
            .cloned()
            .map(|store| Box::new(store) as Box<dyn RecordStore>)
            .ok_or_else(|| ReaderError::store_open(&config.source, "no such store"))
    }
}
