use std::path::PathBuf;

use crate::types::{Entry, SEPARATOR, TERMINATOR};

/// Metadata about a segment file, gathered while its index is built.
#[derive(Debug, Clone)]
pub struct SSTableMeta {
    /// Ordinal of the segment within its engine (creation order).
    pub id: u64,
    /// Location of the backing file.
    pub path: PathBuf,
    /// Smallest key in the segment. Empty for a segment with no entries.
    pub min_key: Vec<u8>,
    /// Largest key in the segment.
    pub max_key: Vec<u8>,
    /// Number of indexed entries.
    pub entry_count: u64,
    /// File size in bytes.
    pub file_size: u64,
    /// Lines dropped at open because they lacked a separator.
    pub skipped_lines: u64,
}

/// One entry of the in-memory segment index: a key and the byte offset
/// of the line that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub offset: u64,
}

/// Encode an entry as a segment line.
///
/// Format: `key:value\n`. No length prefix, no checksum.
pub fn encode_entry(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key.len() + value.len() + 2);
    buf.extend_from_slice(key);
    buf.push(SEPARATOR);
    buf.extend_from_slice(value);
    buf.push(TERMINATOR);
    buf
}

/// Split a segment line at its first separator.
///
/// Accepts the line with or without its terminator; a trailing `\n` (and a
/// preceding `\r`) is stripped from the value. Returns `None` if the line
/// has no separator.
pub fn decode_line(line: &[u8]) -> Option<Entry> {
    let line = strip_terminator(line);
    let split = line.iter().position(|&b| b == SEPARATOR)?;
    Some(Entry::new(&line[..split], &line[split + 1..]))
}

/// Byte slice of the key portion of a line, without allocating.
pub fn line_key(line: &[u8]) -> Option<&[u8]> {
    let line = strip_terminator(line);
    line.iter()
        .position(|&b| b == SEPARATOR)
        .map(|split| &line[..split])
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[TERMINATOR]).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
