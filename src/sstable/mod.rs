//! Immutable on-disk segments.
//!
//! A segment is a text file of `key:value\n` lines sorted ascending by
//! key, written once by [`builder::SSTableBuilder`] and read through the
//! in-memory index kept by [`reader::SSTable`].

pub mod builder;
pub mod format;
pub mod reader;

pub use builder::SSTableBuilder;
pub use format::{IndexEntry, SSTableMeta};
pub use reader::SSTable;
