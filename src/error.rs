use std::io;

use thiserror::Error;

/// Unified error type for the storage engine.
///
/// A missing key is never an error: lookups return `Option`.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from creating, writing, opening or reading a segment file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A segment file or its metadata is in a state the engine cannot use.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Entries were handed to a segment builder out of ascending key order.
    #[error("key {key:?} added after {previous:?}; segment keys must be strictly ascending")]
    UnsortedKey { previous: Vec<u8>, key: Vec<u8> },
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
