// rust/reader-core/src/reader/mod.rs

//! Background record loading shared between consumers of the same source.
//!
//! Every source identity (`name:source`) is served by one [`Body`]: a
//! thread that walks the source's records and copies each one into a buffer
//! taken from an attached consumer's `free` queue, then hands the buffer
//! over on that consumer's `full` queue. Each [`DataReader`] owns one such
//! queue pair; readers for the same source share the body and its cursor.
//!
//! ```no_run
//! use reader_core::{DataReader, SourceConfig, StorageConfig};
//!
//! let source = SourceConfig::new("train", "train.bin");
//! let reader = DataReader::local(&source, &StorageConfig::default()).unwrap();
//!
//! let buffer = reader.full().pop().unwrap();
//! println!("record of {} bytes", buffer.len());
//! reader.free().push(buffer).unwrap();
//! ```

mod body;
mod queue;
mod registry;
mod traversal;

pub use body::{Body, BodyState};
pub use queue::{liveness, BlockingQueue, Buffer, LivenessGuard, LivenessWatch, QueuePair};
pub use registry::is_live;
pub use traversal::{traversal_for, Sequential, Shuffled, Traversal};

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{SourceConfig, StorageConfig};
use crate::error::Result;
use crate::store::{FileStoreOpener, StoreOpener};

/// A consumer's view of a shared reader body.
///
/// Take filled buffers from [`full`](Self::full) and return them to
/// [`free`](Self::free) once done. Dropping the handle detaches its queue
/// pair; dropping the last handle for a source stops and joins its body.
pub struct DataReader {
    // Declared first so the body sees the consumer leave before it is released
    consumer: LivenessGuard,
    queue_pair: Arc<QueuePair>,
    body: Arc<Body>,
}

impl DataReader {
    /// Attaches a new consumer to the body serving `config`, starting the
    /// body if no running one exists.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, if the store cannot be opened or holds
    /// no records, or if the body stopped before the pair was attached.
    pub fn new(config: &SourceConfig, opener: &dyn StoreOpener) -> Result<Self> {
        config.validate()?;

        let body = registry::resolve_or_create(config, opener)?;
        let (queue_pair, consumer) = QueuePair::new(config.buffer_pool_size, body.producer_watch());
        let queue_pair = Arc::new(queue_pair);
        body.attach(queue_pair.clone())?;

        debug!(
            source = %body.source_key(),
            body_id = body.id(),
            buffers = config.buffer_pool_size,
            "data reader attached"
        );

        Ok(Self {
            consumer,
            queue_pair,
            body,
        })
    }

    /// Reads record files from the local filesystem.
    pub fn local(config: &SourceConfig, storage: &StorageConfig) -> Result<Self> {
        let opener = FileStoreOpener::local(storage)?;
        Self::new(config, &opener)
    }

    /// Empty buffers to hand back after consuming a record.
    pub fn free(&self) -> &BlockingQueue<Buffer> {
        self.queue_pair.free()
    }

    /// Buffers holding the next records, in delivery order.
    pub fn full(&self) -> &BlockingQueue<Buffer> {
        self.queue_pair.full()
    }

    pub fn source_key(&self) -> &str {
        self.body.source_key()
    }

    /// Identifies the body serving this reader. Readers of the same source
    /// report the same id.
    pub fn body_id(&self) -> u64 {
        self.body.id()
    }

    /// Number of buffers cycling between this reader and its body.
    pub fn capacity(&self) -> usize {
        self.queue_pair.size()
    }

    pub fn reader_state(&self) -> BodyState {
        self.body.state()
    }
}

impl fmt::Debug for DataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("source_key", &self.source_key())
            .field("body_id", &self.body_id())
            .field("capacity", &self.capacity())
            .field("state", &self.reader_state())
            .finish()
    }
}

impl Drop for DataReader {
    fn drop(&mut self) {
        debug!(source = %self.body.source_key(), body_id = self.body.id(), "data reader detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;
    use crate::store::{MemoryStore, MemoryStoreOpener, RecordCursor, RecordStore};
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    static NEXT_NAME: AtomicUsize = AtomicUsize::new(0);

    fn unique_name(prefix: &str) -> String {
        format!("{prefix}-reader-{}", NEXT_NAME.fetch_add(1, Ordering::Relaxed))
    }

    fn memory_source(records: &[&'static str]) -> (SourceConfig, MemoryStoreOpener) {
        let path = unique_name("/mem");
        let opener = MemoryStoreOpener::new()
            .with_store(MemoryStore::new(path.clone(), records.iter().copied()));
        (SourceConfig::new(unique_name("src"), path), opener)
    }

    fn next(reader: &DataReader) -> Bytes {
        let buffer = reader
            .full()
            .pop_timeout(Duration::from_secs(5))
            .unwrap()
            .expect("timed out waiting for a record");
        let value = Bytes::copy_from_slice(&buffer);
        reader.free().push(buffer).unwrap();
        value
    }

    #[test]
    fn test_lifecycle_stops_body_on_last_drop() {
        let (mut config, opener) = memory_source(&["A", "B", "C"]);
        config.buffer_pool_size = 2;
        let key = config.source_key();

        let reader = DataReader::new(&config, &opener).unwrap();
        assert_eq!(reader.capacity(), 2);
        assert_eq!(reader.source_key(), key);
        assert!(is_live(&key));

        let buffer = reader.full().pop().unwrap();
        assert_eq!(&buffer[..], b"A");
        reader.free().push(buffer).unwrap();

        let body: Weak<Body> = Arc::downgrade(&reader.body);
        let watch = reader.body.producer_watch();
        drop(reader);

        assert!(body.upgrade().is_none());
        assert!(!watch.is_alive());
        assert!(!is_live(&key));
    }

    #[test]
    fn test_readers_of_same_source_share_body() {
        let (config, opener) = memory_source(&["A", "B"]);

        let first = DataReader::new(&config, &opener).unwrap();
        let second = DataReader::new(&config, &opener).unwrap();

        assert_eq!(first.body_id(), second.body_id());
        assert!(!Arc::ptr_eq(&first.queue_pair, &second.queue_pair));

        next(&first);
        next(&second);

        // The body outlives the first reader
        drop(first);
        assert!(is_live(&config.source_key()));
        next(&second);
    }

    #[test]
    fn test_same_path_different_name_gets_own_body() {
        let (config, opener) = memory_source(&["A"]);
        let other = SourceConfig {
            name: unique_name("other"),
            ..config.clone()
        };

        let first = DataReader::new(&config, &opener).unwrap();
        let second = DataReader::new(&other, &opener).unwrap();

        assert_ne!(first.body_id(), second.body_id());
        assert_eq!(next(&first), "A");
        assert_eq!(next(&second), "A");
    }

    #[test]
    fn test_invalid_config_starts_nothing() {
        let (mut config, opener) = memory_source(&["A"]);
        config.buffer_pool_size = 0;

        let err = DataReader::new(&config, &opener).unwrap_err();
        assert!(matches!(err, ReaderError::Config { .. }));
        assert!(!is_live(&config.source_key()));
    }

    #[test]
    fn test_empty_source_fails() {
        let (config, opener) = memory_source(&[]);
        let err = DataReader::new(&config, &opener).unwrap_err();
        assert!(matches!(err, ReaderError::EmptySource { .. }));
        assert!(!is_live(&config.source_key()));
    }

    #[test]
    fn test_unopenable_store_fails() {
        let config = SourceConfig::new(unique_name("missing"), "/mem/absent");
        let err = DataReader::new(&config, &MemoryStoreOpener::new()).unwrap_err();
        assert!(matches!(err, ReaderError::StoreOpen { .. }));
    }

    #[test]
    fn test_sequential_records_wrap_around() {
        let (config, opener) = memory_source(&["A", "B", "C"]);
        let reader = DataReader::new(&config, &opener).unwrap();

        let seen: Vec<Bytes> = (0..7).map(|_| next(&reader)).collect();
        assert_eq!(seen, vec!["A", "B", "C", "A", "B", "C", "A"]);
        assert_eq!(reader.reader_state(), BodyState::Serving);
    }

    #[test]
    fn test_shuffled_pass_covers_every_record() {
        let records = ["0", "1", "2", "3", "4", "5", "6", "7"];
        let (mut config, opener) = memory_source(&records);
        config.shuffle = true;

        let reader = DataReader::new(&config, &opener).unwrap();
        let expected: HashSet<Bytes> = records.into_iter().map(Bytes::from).collect();

        for _ in 0..3 {
            let pass: HashSet<Bytes> = (0..records.len()).map(|_| next(&reader)).collect();
            assert_eq!(pass, expected);
        }
    }

    #[test]
    fn test_consumer_owns_buffer_until_returned() {
        let (mut config, opener) = memory_source(&["A", "B", "C"]);
        config.buffer_pool_size = 1;
        let reader = DataReader::new(&config, &opener).unwrap();

        let held = reader.full().pop().unwrap();
        thread::sleep(Duration::from_millis(20));
        // Nothing can be produced while the only buffer is held
        assert!(reader.full().is_empty());
        assert_eq!(reader.free().len(), 0);

        reader.free().push(held).unwrap();
        assert_eq!(next(&reader), "B");
    }

    #[test]
    fn test_local_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("rows.txt"), b"first\nsecond\n").unwrap();

        let storage = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        let config = SourceConfig {
            format: crate::config::RecordFormatType::Newline,
            ..SourceConfig::new(unique_name("rows"), "rows.txt")
        };

        let reader = DataReader::local(&config, &storage).unwrap();
        assert_eq!(next(&reader), "first");
        assert_eq!(next(&reader), "second");
        assert_eq!(next(&reader), "first");
    }

    struct BrokenStore;

    struct BrokenCursor {
        position: usize,
    }

    impl RecordStore for BrokenStore {
        fn path(&self) -> &str {
            "broken"
        }

        fn cursor(&self) -> crate::error::Result<Box<dyn RecordCursor>> {
            Ok(Box::new(BrokenCursor { position: 0 }))
        }
    }

    impl RecordCursor for BrokenCursor {
        fn valid(&self) -> bool {
            self.position < 2
        }

        fn key(&self) -> crate::error::Result<Bytes> {
            Ok(Bytes::copy_from_slice(&(self.position as u64).to_be_bytes()))
        }

        fn value(&self) -> crate::error::Result<Bytes> {
            if self.position == 0 {
                Ok(Bytes::from_static(b"ok"))
            } else {
                Err(ReaderError::store_fatal("device gone"))
            }
        }

        fn advance(&mut self) -> crate::error::Result<()> {
            self.position += 1;
            Ok(())
        }

        fn seek_first(&mut self) -> crate::error::Result<()> {
            self.position = 0;
            Ok(())
        }
    }

    struct BrokenOpener;

    impl StoreOpener for BrokenOpener {
        fn open(&self, _config: &SourceConfig) -> crate::error::Result<Box<dyn RecordStore>> {
            Ok(Box::new(BrokenStore))
        }
    }

    #[test]
    fn test_fatal_store_error_wakes_blocked_consumer() {
        let config = SourceConfig::new(unique_name("broken"), "broken");
        let reader = Arc::new(DataReader::new(&config, &BrokenOpener).unwrap());

        assert_eq!(next(&reader), "ok");

        let waiter = {
            let reader = reader.clone();
            thread::spawn(move || reader.full().pop())
        };
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(ReaderError::Disconnected { queue: "full" })));
        assert_eq!(reader.reader_state(), BodyState::Terminated);

        // A new reader replaces the dead body
        let fresh = DataReader::new(&config, &BrokenOpener).unwrap();
        assert_ne!(fresh.body_id(), reader.body_id());
    }
}
