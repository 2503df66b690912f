use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bloom::BloomFilter;
use crate::error::{Error, Result};
use crate::sstable::format::{decode_line, line_key, IndexEntry, SSTableMeta};
use crate::types::{Value, TERMINATOR};

/// An opened, immutable segment file. Supports point lookups.
///
/// On open:
/// 1. Read the file start to end exactly once
/// 2. Record (key, byte offset) for every line that has a separator;
///    lines without one are skipped. Out-of-order keys are logged and
///    the index is re-sorted
/// 3. Build the bloom filter from the indexed keys
/// 4. Keep one read handle for lookups
///
/// The file is never written again, so the index stays valid for the
/// lifetime of the segment.
#[derive(Debug)]
pub struct SSTable {
    /// Read handle shared by lookups; each lookup seeks before reading.
    file: Mutex<File>,
    /// One entry per indexed line, ascending by key.
    index: Vec<IndexEntry>,
    bloom: Option<BloomFilter>,
    meta: SSTableMeta,
}

impl SSTable {
    /// Open a segment file with no bloom filter and ordinal 0.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, 0, None)
    }

    /// Open a segment file, tagging it with `id` and building a bloom
    /// filter at the given false positive rate if one is requested.
    pub fn open_with(path: &Path, id: u64, bloom_false_positive_rate: Option<f64>) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut index: Vec<IndexEntry> = Vec::new();
        let mut skipped_lines = 0u64;
        let mut unsorted_lines = 0u64;
        let mut offset = 0u64;
        {
            let mut reader = BufReader::new(&mut file);
            let mut line = Vec::new();
            loop {
                line.clear();
                let n = reader.read_until(TERMINATOR, &mut line)?;
                if n == 0 {
                    break;
                }
                match line_key(&line) {
                    Some(key) => {
                        if index.last().is_some_and(|last| key < last.key.as_slice()) {
                            unsorted_lines += 1;
                        }
                        index.push(IndexEntry {
                            key: key.to_vec(),
                            offset,
                        });
                    }
                    None => skipped_lines += 1,
                }
                offset += n as u64;
            }
        }

        if skipped_lines > 0 {
            warn!(
                path = %path.display(),
                skipped_lines,
                "skipped segment lines without a separator"
            );
        }

        // Keys holding a delimiter index under a fragment and can land out of
        // order. A stable sort keeps binary search valid and keeps file order
        // among equal keys.
        if unsorted_lines > 0 {
            warn!(
                path = %path.display(),
                unsorted_lines,
                "segment index keys out of order; keys likely contain a delimiter"
            );
            index.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let bloom = bloom_false_positive_rate
            .map(|rate| BloomFilter::from_keys(index.iter().map(|e| e.key.as_slice()), rate));

        let meta = SSTableMeta {
            id,
            path: path.to_path_buf(),
            min_key: index.first().map(|e| e.key.clone()).unwrap_or_default(),
            max_key: index.last().map(|e| e.key.clone()).unwrap_or_default(),
            entry_count: index.len() as u64,
            file_size: offset,
            skipped_lines,
        };

        debug!(
            path = %path.display(),
            id,
            entries = meta.entry_count,
            bloom = bloom.is_some(),
            "segment opened"
        );

        Ok(SSTable {
            file: Mutex::new(file),
            index,
            bloom,
            meta,
        })
    }

    /// Point lookup.
    ///
    /// Algorithm:
    /// 1. Key outside [min_key, max_key] → None
    /// 2. Bloom filter says absent → None
    /// 3. Binary search the index for the lower bound; anything but an
    ///    exact match → None
    /// 4. Seek to the recorded offset, read one line, return its value
    ///
    /// An IO failure in step 4 is returned as an error rather than
    /// folded into `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        if self.index.is_empty()
            || key < self.meta.min_key.as_slice()
            || key > self.meta.max_key.as_slice()
        {
            return Ok(None);
        }

        if let Some(bloom) = &self.bloom {
            if !bloom.may_contain(key) {
                return Ok(None);
            }
        }

        // Lower bound: with repeated keys the first line in the file wins.
        let pos = self.index.partition_point(|entry| entry.key.as_slice() < key);
        if self.index.get(pos).is_none_or(|entry| entry.key != key) {
            return Ok(None);
        }

        let offset = self.index[pos].offset;
        let line = self.read_line_at(offset)?;
        match decode_line(&line) {
            Some(entry) if entry.key == key => Ok(Some(entry.value)),
            _ => Err(Error::Corruption(format!(
                "{}: line at offset {} no longer holds the indexed key",
                self.meta.path.display(),
                offset
            ))),
        }
    }

    fn read_line_at(&self, offset: u64) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut line = Vec::new();
        BufReader::new(&mut *file).read_until(TERMINATOR, &mut line)?;
        Ok(line)
    }

    /// The in-memory index, ascending by key.
    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// Get metadata about this segment.
    pub fn meta(&self) -> &SSTableMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
