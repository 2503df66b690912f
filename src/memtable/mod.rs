use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::sstable::{SSTableBuilder, SSTableMeta};
use crate::types::{Key, Value};

/// In-memory write buffer. Every write lands here first.
///
/// Unsorted while it accumulates: a hash map gives O(1) amortized
/// upserts and point reads. Keys are sorted only once, when the buffer
/// is flushed to a segment.
///
/// The buffer never clears itself. After a successful flush the owner
/// swaps in a fresh, empty memtable.
#[derive(Debug, Default)]
pub struct MemTable {
    data: HashMap<Key, Value>,
    size_bytes: usize,
}

impl MemTable {
    /// Create a new empty memtable.
    pub fn new() -> Self {
        MemTable::default()
    }

    /// Insert or overwrite a key-value pair.
    pub fn set(&mut self, key: Key, value: Value) {
        let (key_len, value_len) = (key.len(), value.len());
        match self.data.insert(key, value) {
            // Key bytes were already counted.
            Some(old) => self.size_bytes = self.size_bytes - old.len() + value_len,
            None => self.size_bytes += key_len + value_len,
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Approximate memory usage: total bytes of keys and values.
    pub fn size(&self) -> usize {
        self.size_bytes
    }

    /// Check whether the buffer has reached `limit` bytes.
    pub fn is_full(&self, limit: usize) -> bool {
        self.size_bytes >= limit
    }

    /// All entries in ascending key order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        let mut entries: Vec<(&Key, &Value)> = self.data.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Write every entry, sorted by key, to a new segment file at `path`.
    ///
    /// The file only appears under `path` once it is completely written;
    /// on failure nothing is left behind. The buffer is not modified.
    pub fn flush(&self, path: &Path) -> Result<SSTableMeta> {
        self.flush_as(path, 0, true)
    }

    pub(crate) fn flush_as(&self, path: &Path, sst_id: u64, sync: bool) -> Result<SSTableMeta> {
        let mut builder = SSTableBuilder::new(path, sst_id, sync)?;
        for (key, value) in self.iter_sorted() {
            builder.add(key, value)?;
        }
        builder.finish()
    }
}
