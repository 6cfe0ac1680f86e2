// rust/reader-core/src/store/format.rs

use std::sync::Arc;

use crate::config::RecordFormatType;

/// Describes how to find record boundaries
pub trait RecordFormat: Send + Sync {
    /// Find the end of the record that starts at `offset` in `data`.
    /// Returns the byte position after the record ends (exclusive end).
    /// Returns None if no complete record starts at `offset`.
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize>;

    /// Range of the payload inside the record `start..end`.
    fn payload(&self, data: &[u8], start: usize, end: usize) -> (usize, usize);

    /// Name of this record format
    fn name(&self) -> &'static str;
}

/// Builds the format implementation for a configured format type.
pub fn format_for(kind: RecordFormatType) -> Arc<dyn RecordFormat> {
    match kind {
        RecordFormatType::LengthPrefixed => Arc::new(LengthPrefixedFormat::new()),
        RecordFormatType::Newline => Arc::new(NewlineDelimitedFormat::new()),
    }
}

/// Newline-delimited records (JSONL, CSV, etc.)
#[derive(Debug, Clone, Default)]
pub struct NewlineDelimitedFormat;

impl NewlineDelimitedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for NewlineDelimitedFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset >= data.len() {
            return None;
        }

        // The final line may omit its newline
        match data[offset..].iter().position(|&byte| byte == b'\n') {
            Some(i) => Some(offset + i + 1), // Include the newline
            None => Some(data.len()),
        }
    }

    fn payload(&self, data: &[u8], start: usize, end: usize) -> (usize, usize) {
        let mut end = end;
        if end > start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }
        (start, end)
    }

    fn name(&self) -> &'static str {
        "newline-delimited"
    }
}

/// Length-prefixed records (4-byte big-endian length + data)
#[derive(Debug, Clone, Default)]
pub struct LengthPrefixedFormat;

impl LengthPrefixedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for LengthPrefixedFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset + 4 > data.len() {
            return None;
        }

        let length_bytes: [u8; 4] = data[offset..offset + 4].try_into().ok()?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        let end = offset + 4 + length;
        if end <= data.len() {
            Some(end)
        } else {
            None
        }
    }

    fn payload(&self, _data: &[u8], start: usize, end: usize) -> (usize, usize) {
        (start + 4, end)
    }

    fn name(&self) -> &'static str {
        "length-prefixed"
    }
}
