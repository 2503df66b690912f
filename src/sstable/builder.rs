use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sstable::format::{encode_entry, SSTableMeta};
use crate::types::{SEPARATOR, TERMINATOR};

/// Writes a segment file from a sorted stream of key-value pairs.
///
/// Used by memtable flush. Build process:
/// 1. Entries are appended to `<path>.tmp`, one line each, in strictly
///    ascending key order
/// 2. `finish()` flushes the buffer, optionally fsyncs, then renames the
///    temporary file onto `path`
///
/// A builder dropped before `finish()` succeeds removes its temporary
/// file, so a failed flush never leaves a file under the segment name.
pub struct SSTableBuilder {
    /// Buffered writer over the temporary file. `None` once finished.
    writer: Option<BufWriter<File>>,
    /// Final segment location.
    path: PathBuf,
    /// Where lines are written until the segment is published.
    tmp_path: PathBuf,
    /// Segment ordinal, copied into the returned metadata.
    sst_id: u64,
    /// fsync before the rename.
    sync: bool,
    min_key: Option<Vec<u8>>,
    /// Last key added; the next key must sort strictly after it.
    last_key: Option<Vec<u8>>,
    entry_count: u64,
    /// Bytes written so far, which is also the offset of the next line.
    offset: u64,
    published: bool,
}

impl SSTableBuilder {
    /// Create a builder that will publish a segment at `path`.
    pub fn new(path: &Path, sst_id: u64, sync: bool) -> Result<Self> {
        let tmp_path = tmp_path_for(path);
        let file = File::create(&tmp_path)?;
        Ok(SSTableBuilder {
            writer: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
            tmp_path,
            sst_id,
            sync,
            min_key: None,
            last_key: None,
            entry_count: 0,
            offset: 0,
            published: false,
        })
    }

    /// Append one entry. Keys MUST arrive in strictly ascending order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(previous) = &self.last_key {
            if key <= previous.as_slice() {
                return Err(Error::UnsortedKey {
                    previous: previous.clone(),
                    key: key.to_vec(),
                });
            }
        }
        if key.contains(&SEPARATOR) || key.contains(&TERMINATOR) {
            warn!(
                key = %String::from_utf8_lossy(key),
                "key contains a segment delimiter and will not read back intact"
            );
        }
        if value.contains(&TERMINATOR) {
            warn!(
                key = %String::from_utf8_lossy(key),
                "value contains a line terminator and will be truncated on read"
            );
        }

        let line = encode_entry(key, value);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Corruption("segment builder already finished".into()))?;
        writer.write_all(&line)?;

        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.last_key = Some(key.to_vec());
        self.entry_count += 1;
        self.offset += line.len() as u64;
        Ok(())
    }

    /// Flush, optionally fsync, and atomically publish the segment.
    pub fn finish(mut self) -> Result<SSTableMeta> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::Corruption("segment builder already finished".into()))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        if self.sync {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        self.published = true;

        debug!(
            path = %self.path.display(),
            entries = self.entry_count,
            bytes = self.offset,
            "segment written"
        );

        Ok(SSTableMeta {
            id: self.sst_id,
            path: self.path.clone(),
            min_key: self.min_key.take().unwrap_or_default(),
            max_key: self.last_key.take().unwrap_or_default(),
            entry_count: self.entry_count,
            file_size: self.offset,
            skipped_lines: 0,
        })
    }
}

impl Drop for SSTableBuilder {
    fn drop(&mut self) {
        if !self.published {
            // Close before unlinking.
            self.writer.take();
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// `sstable_3.txt` -> `sstable_3.txt.tmp`
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
