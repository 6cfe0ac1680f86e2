// rust/reader-core/src/reader/traversal.rs

//! Order in which a reader body visits the records of its store.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::{ReaderError, Result};
use crate::store::{RecordCursor, RecordStore};

/// Endless walk over the records of a store.
///
/// Only the owning body's thread calls into a traversal.
pub trait Traversal: Send {
    /// Payload at the current position, without moving.
    fn value(&self) -> Result<Bytes>;

    /// Moves to the next record, wrapping to the first after the last.
    fn advance(&mut self) -> Result<()>;
}

/// Builds the traversal a source asks for.
///
/// # Errors
///
/// Returns `EmptySource` if the store has no records.
pub fn traversal_for(
    config: &SourceConfig,
    store: Box<dyn RecordStore>,
) -> Result<Box<dyn Traversal>> {
    let source_key = config.source_key();
    if config.shuffle {
        Ok(Box::new(Shuffled::new(store, &source_key, config.seed)?))
    } else {
        Ok(Box::new(Sequential::new(store, &source_key)?))
    }
}

/// Store order, driven directly by the store's cursor.
pub struct Sequential {
    cursor: Box<dyn RecordCursor>,
    // Keeps the store open for as long as the cursor walks it
    _store: Box<dyn RecordStore>,
}

impl Sequential {
    pub fn new(store: Box<dyn RecordStore>, source_key: &str) -> Result<Self> {
        let cursor = store.cursor()?;
        if !cursor.valid() {
            return Err(ReaderError::empty_source(source_key));
        }
        Ok(Self {
            cursor,
            _store: store,
        })
    }
}

impl Traversal for Sequential {
    fn value(&self) -> Result<Bytes> {
        self.cursor.value()
    }

    fn advance(&mut self) -> Result<()> {
        self.cursor.advance()?;
        if !self.cursor.valid() {
            debug!("restarting from the first record");
            self.cursor.seek_first()?;
        }
        Ok(())
    }
}

/// A fresh random permutation of all records on every pass.
///
/// The store is read once up front; the collected values share the store's
/// loaded data rather than copying it.
pub struct Shuffled {
    records: Vec<Bytes>,
    order: Vec<usize>,
    position: usize,
    rng: StdRng,
}

impl Shuffled {
    /// `seed` makes the sequence of passes reproducible; without one the
    /// generator is seeded from the OS.
    pub fn new(store: Box<dyn RecordStore>, source_key: &str, seed: Option<u64>) -> Result<Self> {
        let mut cursor = store.cursor()?;
        let mut records = Vec::new();
        while cursor.valid() {
            match cursor.value() {
                Ok(value) => records.push(value),
                Err(e) if e.is_transient() => {
                    warn!(source = source_key, error = %e, "skipping unreadable record");
                }
                Err(e) => return Err(e),
            }
            cursor.advance()?;
        }
        if records.is_empty() {
            return Err(ReaderError::empty_source(source_key));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        debug!(source = source_key, records = records.len(), "indexed records for shuffling");

        let mut shuffled = Self {
            order: (0..records.len()).collect(),
            records,
            position: 0,
            rng,
        };
        shuffled.reshuffle();
        Ok(shuffled)
    }

    /// Number of records in one pass.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn reshuffle(&mut self) {
        self.order.shuffle(&mut self.rng);
        self.position = 0;
    }
}

impl Traversal for Shuffled {
    fn value(&self) -> Result<Bytes> {
        Ok(self.records[self.order[self.position]].clone())
    }

    fn advance(&mut self) -> Result<()> {
        self.position += 1;
        if self.position == self.order.len() {
            self.reshuffle();
        }
        Ok(())
    }
}
