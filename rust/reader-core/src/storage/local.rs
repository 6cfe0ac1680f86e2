// rust/reader-core/src/storage/local.rs

//! Local filesystem storage backend.
//!
//! Small files are read through a buffered reader, large files are
//! memory-mapped and handed out as views of the mapping.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;

use super::traits::{StorageBackend, StorageReader};
use crate::config::StorageConfig;
use crate::error::{ReaderError, Result};

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path that relative paths are resolved against.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
    /// Whether to use memory-mapped I/O.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` instance from configuration.
    ///
    /// The base path is not created; readers only ever open existing files.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        if config.buffer_size == 0 {
            return Err(ReaderError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        Ok(Self {
            base_path: config.base_path.clone(),
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl StorageBackend for LocalStorage {
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path)
            .map_err(|e| ReaderError::storage_with_source(&full_path, "failed to open file", e))?;

        let meta = file.metadata().map_err(|e| {
            ReaderError::storage_with_source(&full_path, "failed to read file metadata", e)
        })?;
        if meta.is_dir() {
            return Err(ReaderError::storage(&full_path, "path is a directory"));
        }
        let size = meta.len();

        // mmap of an empty file fails on some platforms
        if self.use_mmap && size > 0 && size >= self.mmap_threshold {
            // SAFETY: The file is opened read-only and the mapping is owned by
            // the returned bytes for as long as any view of it is alive.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                ReaderError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;

            Ok(Box::new(MmapReader::new(mmap, full_path)))
        } else {
            Ok(Box::new(LocalReader::new(file, size, self.buffer_size, full_path)))
        }
    }
}

/// Buffered file reader for local storage.
struct LocalReader {
    reader: BufReader<File>,
    size: u64,
    path: PathBuf,
}

impl LocalReader {
    fn new(file: File, size: u64, buffer_size: usize, path: PathBuf) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
            path,
        }
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Bytes> {
        self.reader.seek(SeekFrom::Start(start)).map_err(|e| {
            ReaderError::storage_with_source(
                &self.path,
                format!("failed to seek to position {start}"),
                e,
            )
        })?;

        let mut buf = vec![0u8; length];
        self.reader.read_exact(&mut buf).map_err(|e| {
            ReaderError::storage_with_source(
                &self.path,
                format!("failed to read {length} bytes at position {start}"),
                e,
            )
        })?;

        Ok(Bytes::from(buf))
    }
}

/// Memory-mapped file reader for local storage.
struct MmapReader {
    data: Bytes,
    path: PathBuf,
}

impl MmapReader {
    fn new(mmap: Mmap, path: PathBuf) -> Self {
        Self {
            data: Bytes::from_owner(mmap),
            path,
        }
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Bytes> {
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let end = start.saturating_add(length);

        if end > self.data.len() {
            return Err(ReaderError::storage(
                &self.path,
                format!(
                    "read range {}..{} exceeds file size {}",
                    start,
                    end,
                    self.data.len()
                ),
            ));
        }

        Ok(self.data.slice(start..end))
    }
}
