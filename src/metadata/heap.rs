//! `#Strings` and `#Blob` heaps.
//!
//! Both heaps start with an empty entry at offset 0. Strings are UTF-8 and
//! NUL-terminated; blobs carry a compressed length prefix.

use std::collections::HashMap;

use super::signature::{read_compressed_u32, write_compressed_u32};
use crate::error::{ModelError, Result};

/// Offset into the `#Strings` heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StringIndex(pub u32);

/// Offset into the `#Blob` heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlobIndex(pub u32);

#[derive(Debug, Clone)]
pub struct StringHeap {
    bytes: Vec<u8>,
    interned: HashMap<String, StringIndex>,
}

impl StringHeap {
    pub fn new() -> Self {
        Self {
            bytes: vec![0],
            interned: HashMap::new(),
        }
    }

    pub fn get(&self, index: StringIndex) -> Result<&str> {
        let start = index.0 as usize;
        let tail = self
            .bytes
            .get(start..)
            .ok_or_else(|| ModelError::malformed(format!("string offset {start} outside heap")))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ModelError::malformed(format!("unterminated string at {start}")))?;
        std::str::from_utf8(&tail[..len])
            .map_err(|_| ModelError::malformed(format!("invalid UTF-8 string at {start}")))
    }

    /// Append `value` unless an identical string is already stored.
    pub fn intern(&mut self, value: &str) -> StringIndex {
        if value.is_empty() {
            return StringIndex(0);
        }
        if let Some(&index) = self.interned.get(value) {
            return index;
        }
        let index = StringIndex(self.bytes.len() as u32);
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        self.interned.insert(value.to_string(), index);
        index
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= 1
    }
}

impl Default for StringHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct BlobHeap {
    bytes: Vec<u8>,
}

impl BlobHeap {
    pub fn new() -> Self {
        Self { bytes: vec![0] }
    }

    pub fn get(&self, index: BlobIndex) -> Result<&[u8]> {
        let start = index.0 as usize;
        let mut cursor = self
            .bytes
            .get(start..)
            .ok_or_else(|| ModelError::malformed(format!("blob offset {start} outside heap")))?;
        let len = read_compressed_u32(&mut cursor)? as usize;
        cursor
            .get(..len)
            .ok_or_else(|| ModelError::malformed(format!("blob at {start} overruns heap")))
    }

    pub fn push(&mut self, blob: &[u8]) -> Result<BlobIndex> {
        if blob.is_empty() {
            return Ok(BlobIndex(0));
        }
        let index = BlobIndex(self.bytes.len() as u32);
        write_compressed_u32(&mut self.bytes, blob.len() as u32)?;
        self.bytes.extend_from_slice(blob);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= 1
    }
}

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}
