/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Splits a segment line into key and value. Must never appear inside a key.
pub const SEPARATOR: u8 = b':';

/// Ends every segment line.
pub const TERMINATOR: u8 = b'\n';

/// A single key-value pair as it is laid out in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Entry {
            key: key.into(),
            value: value.into(),
        }
    }
}
