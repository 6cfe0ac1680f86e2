// rust/reader-core/src/storage/mod.rs

//! Storage abstraction that record stores load their data through.
//!
//! # Example
//!
//! ```no_run
//! use reader_core::config::StorageConfig;
//! use reader_core::storage::{LocalStorage, StorageBackend, StorageReader};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//! let mut reader = storage.open_read(Path::new("train.bin")).unwrap();
//! let header = reader.read_range(0, 4).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{StorageBackend, StorageReader};
