// rust/reader-core/src/lib.rs

//! Reader Core
//!
//! Background record loading for training pipelines. One reader thread per
//! source walks a keyed record store, sequentially or in a fresh shuffled
//! order each pass, and hands records to any number of consumers through
//! bounded pairs of free and full buffer queues.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{ReaderConfig, RecordFormatType, SourceConfig, StorageConfig};
pub use error::{ReaderError, Result};
pub use storage::{LocalStorage, StorageBackend, StorageReader};

pub mod store;
pub use store::{
    FileStoreOpener, LengthPrefixedFormat, MemoryStore, MemoryStoreOpener,
    NewlineDelimitedFormat, RecordCursor, RecordFileStore, RecordFormat, RecordStore, StoreOpener,
};

pub mod reader;
pub use reader::{is_live, BlockingQueue, BodyState, Buffer, DataReader, QueuePair};

pub mod runtime;
pub use runtime::Runtime;
