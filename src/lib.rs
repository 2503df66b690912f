//! # LSM Key-Value Store
//!
//! A minimal key-value store using the Log-Structured Merge-Tree layout.
//!
//! ## Core idea
//! Writes go to an in-memory buffer. `flush` spills the buffer to an
//! immutable segment file sorted by key, with an in-memory index for
//! binary search. Reads check the buffer, then segments from newest to
//! oldest, so the most recent write for a key always wins.
//!
//! ```no_run
//! use lsm_kv::{DB, Options};
//!
//! # fn main() -> lsm_kv::Result<()> {
//! let db = DB::open(Options::new("/tmp/lsm-kv"))?;
//! db.set("key1", "value1");
//! db.flush()?;
//! assert_eq!(db.get(b"key1")?, Some(b"value1".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! There is no compaction, no deletion, and no write-ahead log: anything
//! still in the buffer when the process exits is lost.

pub mod bloom;
pub mod db;
pub mod error;
pub mod memtable;
pub mod sstable;
pub mod types;

// Public re-exports for the top-level API
pub use db::{DB, Options, Stats};
pub use error::{Error, Result};
