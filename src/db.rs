//! The engine: one write buffer in front of an append-only list of segments.
//!
//! Reads go buffer first, then segments newest to oldest, so newer data
//! always shadows older data for the same key. `flush` is the only
//! operation that adds a segment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::memtable::MemTable;
use crate::sstable::{SSTable, SSTableMeta};
use crate::types::{Key, Value};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the segment files.
    pub dir: PathBuf,
    /// Segment files are named `{file_prefix}{ordinal}.{file_extension}`.
    pub file_prefix: String,
    pub file_extension: String,
    /// fsync each segment before it is published.
    pub sync_on_flush: bool,
    /// Per-segment bloom filter target rate. `None` disables the filters.
    pub bloom_false_positive_rate: Option<f64>,
    /// Create `dir` on open if it does not exist.
    pub create_if_missing: bool,
    /// Buffer size in bytes at which `should_flush` starts reporting true.
    /// Never triggers a flush by itself.
    pub write_buffer_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            dir: PathBuf::from("."),
            file_prefix: "sstable_".to_string(),
            file_extension: "txt".to_string(),
            sync_on_flush: true,
            bloom_false_positive_rate: Some(0.01),
            create_if_missing: true,
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl Options {
    /// Default options rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Options {
            dir: dir.into(),
            ..Options::default()
        }
    }

    #[must_use]
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    #[must_use]
    pub fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    #[must_use]
    pub fn bloom_false_positive_rate(mut self, rate: Option<f64>) -> Self {
        self.bloom_false_positive_rate = rate;
        self
    }

    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// File name of the segment with the given ordinal.
    pub fn segment_file_name(&self, id: u64) -> String {
        format!("{}{}.{}", self.file_prefix, id, self.file_extension)
    }

    /// Inverse of `segment_file_name`. `None` for anything else in the directory.
    pub fn parse_segment_file_name(&self, name: &str) -> Option<u64> {
        name.strip_prefix(self.file_prefix.as_str())?
            .strip_suffix(self.file_extension.as_str())?
            .strip_suffix('.')?
            .parse()
            .ok()
    }
}

/// Point-in-time counters for an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub segment_count: usize,
    pub buffered_entries: usize,
    pub buffered_bytes: usize,
    /// Indexed entries across all segments, shadowed ones included.
    pub segment_entries: u64,
    pub segment_bytes: u64,
}

struct Inner {
    memtable: MemTable,
    /// Oldest first. Only ever appended to.
    segments: Vec<Arc<SSTable>>,
    next_id: u64,
}

/// An LSM key-value store.
///
/// All methods take `&self`; a single reader-writer lock serializes
/// writes and flushes against reads. Segments are immutable once
/// published, so lookups read them outside the lock.
pub struct DB {
    options: Options,
    inner: RwLock<Inner>,
}

impl DB {
    /// Open an engine over `options.dir`, loading any segments already there
    /// in ordinal order. Unflushed writes from an earlier process are not
    /// recovered.
    pub fn open(options: Options) -> Result<Self> {
        if options.create_if_missing {
            fs::create_dir_all(&options.dir)?;
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&options.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| options.parse_segment_file_name(n)) {
                found.push((id, entry.path()));
            }
        }
        found.sort_unstable_by_key(|(id, _)| *id);

        let mut segments = Vec::with_capacity(found.len());
        for (id, path) in &found {
            let segment = SSTable::open_with(path, *id, options.bloom_false_positive_rate)?;
            segments.push(Arc::new(segment));
        }
        let next_id = found.last().map_or(0, |(id, _)| id + 1);

        if !segments.is_empty() {
            info!(
                dir = %options.dir.display(),
                segments = segments.len(),
                next_id,
                "loaded existing segments"
            );
        }

        Ok(DB {
            options,
            inner: RwLock::new(Inner {
                memtable: MemTable::new(),
                segments,
                next_id,
            }),
        })
    }

    /// Insert or overwrite a key. Goes to the write buffer only.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        self.inner.write().memtable.set(key.into(), value.into());
    }

    /// Look up a key: write buffer first, then segments newest to oldest.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        let segments = {
            let inner = self.inner.read();
            if let Some(value) = inner.memtable.get(key) {
                trace!("hit in write buffer");
                return Ok(Some(value.to_vec()));
            }
            inner.segments.clone()
        };

        for segment in segments.iter().rev() {
            if let Some(value) = segment.get(key)? {
                trace!(segment = segment.meta().id, "hit in segment");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Move the write buffer into a new segment.
    ///
    /// 1. Name the segment from the next ordinal
    /// 2. Write the sorted buffer to that file
    /// 3. Open it, building its index
    /// 4. Append it to the segment list
    /// 5. Replace the buffer with an empty one
    ///
    /// Steps 4 and 5 only happen once 2 and 3 succeed. On failure the
    /// segment list and the buffer are exactly as they were, and no file
    /// is left under the segment name.
    ///
    /// Flushing an empty buffer produces an empty segment.
    pub fn flush(&self) -> Result<SSTableMeta> {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        let path = self.segment_path(id);

        let written = inner
            .memtable
            .flush_as(&path, id, self.options.sync_on_flush)?;

        let segment = match SSTable::open_with(&path, id, self.options.bloom_false_positive_rate) {
            Ok(segment) => segment,
            Err(e) => return Err(discard_segment(&path, e)),
        };

        inner.segments.push(Arc::new(segment));
        inner.next_id += 1;
        inner.memtable = MemTable::new();

        debug!(
            path = %path.display(),
            entries = written.entry_count,
            segments = inner.segments.len(),
            "flushed write buffer"
        );
        Ok(written)
    }

    /// Whether the buffer has reached `Options::write_buffer_size`.
    pub fn should_flush(&self) -> bool {
        self.inner
            .read()
            .memtable
            .is_full(self.options.write_buffer_size)
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.read();
        Stats {
            segment_count: inner.segments.len(),
            buffered_entries: inner.memtable.len(),
            buffered_bytes: inner.memtable.size(),
            segment_entries: inner.segments.iter().map(|s| s.meta().entry_count).sum(),
            segment_bytes: inner.segments.iter().map(|s| s.meta().file_size).sum(),
        }
    }

    /// Segment files, oldest first.
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .segments
            .iter()
            .map(|s| s.path().to_path_buf())
            .collect()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn segment_path(&self, id: u64) -> PathBuf {
        self.options.dir.join(self.options.segment_file_name(id))
    }
}

/// Remove a segment that was written but could not be opened, and hand
/// back the error that caused it. A failed removal is only logged.
fn discard_segment(path: &Path, cause: Error) -> Error {
    if let Err(cleanup) = remove_if_present(path) {
        warn!(
            path = %path.display(),
            error = %cleanup,
            "could not remove unopenable segment"
        );
    }
    cause
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = Options::default();
        assert_eq!(options.segment_file_name(0), "sstable_0.txt");
        assert!(options.sync_on_flush);
        assert_eq!(options.bloom_false_positive_rate, Some(0.01));
    }

    #[test]
    fn builder_pattern() {
        let options = Options::new("/tmp/db")
            .file_prefix("seg-")
            .file_extension("log")
            .sync_on_flush(false)
            .bloom_false_positive_rate(None)
            .write_buffer_size(1024);

        assert_eq!(options.dir, PathBuf::from("/tmp/db"));
        assert_eq!(options.segment_file_name(7), "seg-7.log");
        assert!(!options.sync_on_flush);
        assert_eq!(options.bloom_false_positive_rate, None);
        assert_eq!(options.write_buffer_size, 1024);
    }

    #[test]
    fn discard_keeps_original_error_when_cleanup_fails() {
        let dir = tempfile::tempdir().unwrap();
        // remove_file on a directory fails with something other than NotFound.
        let blocked = dir.path().join("sstable_0.txt");
        fs::create_dir(&blocked).unwrap();

        let err = discard_segment(&blocked, Error::Corruption("open failed".into()));
        assert!(matches!(err, Error::Corruption(msg) if msg == "open failed"));
        assert!(blocked.exists());
    }

    #[test]
    fn discard_removes_written_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sstable_0.txt");
        fs::write(&path, "a:1\n").unwrap();

        let err = discard_segment(&path, Error::Corruption("open failed".into()));
        assert!(matches!(err, Error::Corruption(_)));
        assert!(!path.exists());
    }

    #[test]
    fn segment_file_names_round_trip() {
        let options = Options::default();
        assert_eq!(options.parse_segment_file_name("sstable_0.txt"), Some(0));
        assert_eq!(options.parse_segment_file_name("sstable_42.txt"), Some(42));
        assert_eq!(options.parse_segment_file_name("sstable_1.txt.tmp"), None);
        assert_eq!(options.parse_segment_file_name("sstable_x.txt"), None);
        assert_eq!(options.parse_segment_file_name("sstable_3txt"), None);
        assert_eq!(options.parse_segment_file_name("other_3.txt"), None);
    }
}
