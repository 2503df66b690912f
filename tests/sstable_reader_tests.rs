// Segment reader tests: index construction, offsets and point lookups.

use std::fs;

use lsm_kv::Error;
use lsm_kv::memtable::MemTable;
use lsm_kv::sstable::{SSTable, SSTableBuilder};
use tempfile::tempdir;

// =============================================================================
// Test 1: Hand-written file, lookups hit and miss
// =============================================================================
#[test]
fn read_hand_written_segment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "key1:value1\nkey2:value2\n").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    assert_eq!(sstable.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(sstable.get(b"key3").unwrap(), None);
}

// =============================================================================
// Test 2: Offsets are running sums of line length + 1
// =============================================================================
#[test]
fn index_records_line_offsets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "a:1\nbb:22\nccc:333\n").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    let offsets: Vec<u64> = sstable.index().iter().map(|e| e.offset).collect();
    assert_eq!(offsets, vec![0, 4, 10]);
    assert_eq!(sstable.meta().file_size, 18);
}

// =============================================================================
// Test 3: Lines without a separator are skipped, not fatal
// =============================================================================
#[test]
fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "a:1\ngarbage\nc:3\npartial").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.len(), 2);
    assert_eq!(sstable.meta().skipped_lines, 2);
    assert_eq!(sstable.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(sstable.get(b"c").unwrap(), Some(b"3".to_vec()));
    assert_eq!(sstable.get(b"garbage").unwrap(), None);

    // "c" starts after "a:1\n" and "garbage\n"
    assert_eq!(sstable.index()[1].offset, 12);
}

// =============================================================================
// Test 4: Trailing line with a separator but no terminator is still indexed
// =============================================================================
#[test]
fn unterminated_last_line_is_readable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "a:1\nb:2").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"b").unwrap(), Some(b"2".to_vec()));
}

// =============================================================================
// Test 5: Exact match required; keys between entries are absent
// =============================================================================
#[test]
fn get_key_between_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sstable_0.txt");

    let mut builder = SSTableBuilder::new(&path, 0, false).unwrap();
    builder.add(b"aaa", b"first").unwrap();
    builder.add(b"ccc", b"third").unwrap();
    builder.add(b"eee", b"fifth").unwrap();
    builder.finish().unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"bbb").unwrap(), None);
    assert_eq!(sstable.get(b"ddd").unwrap(), None);
    assert_eq!(sstable.get(b"___").unwrap(), None);
    assert_eq!(sstable.get(b"zzz").unwrap(), None);
    assert_eq!(sstable.get(b"cc").unwrap(), None);
    assert_eq!(sstable.get(b"ccc").unwrap(), Some(b"third".to_vec()));
}

// =============================================================================
// Test 6: 1000 entries flushed from a buffer all read back, bloom on and off
// =============================================================================
#[test]
fn read_1000_entries_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sstable_0.txt");

    let mut mt = MemTable::new();
    for i in (0..1000u32).rev() {
        mt.set(format!("key_{:05}", i).into_bytes(), format!("val_{:05}", i).into_bytes());
    }
    mt.flush(&path).unwrap();

    for bloom in [None, Some(0.01)] {
        let sstable = SSTable::open_with(&path, 0, bloom).unwrap();
        assert_eq!(sstable.len(), 1000);
        assert_eq!(sstable.meta().min_key, b"key_00000");
        assert_eq!(sstable.meta().max_key, b"key_00999");
        for i in 0..1000u32 {
            let key = format!("key_{:05}", i);
            assert_eq!(
                sstable.get(key.as_bytes()).unwrap(),
                Some(format!("val_{:05}", i).into_bytes()),
                "Failed for key {}",
                key
            );
        }
        assert_eq!(sstable.get(b"key_01000").unwrap(), None);
    }
}

// =============================================================================
// Test 7: Values keep separators and surrounding spaces
// =============================================================================
#[test]
fn values_round_trip_with_separator_and_spaces() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sstable_0.txt");

    let mut mt = MemTable::new();
    mt.set(b"url".to_vec(), b"http://example.com:8080".to_vec());
    mt.set(b"pad".to_vec(), b"  spaced  ".to_vec());
    mt.set(b"empty".to_vec(), b"".to_vec());
    mt.flush(&path).unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"url").unwrap(), Some(b"http://example.com:8080".to_vec()));
    assert_eq!(sstable.get(b"pad").unwrap(), Some(b"  spaced  ".to_vec()));
    assert_eq!(sstable.get(b"empty").unwrap(), Some(Vec::new()));
}

// =============================================================================
// Test 8: Empty segment answers absent for everything
// =============================================================================
#[test]
fn empty_segment_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sstable_0.txt");
    MemTable::new().flush(&path).unwrap();

    let sstable = SSTable::open_with(&path, 0, Some(0.01)).unwrap();
    assert!(sstable.is_empty());
    assert_eq!(sstable.get(b"").unwrap(), None);
    assert_eq!(sstable.get(b"key1").unwrap(), None);
}

// =============================================================================
// Test 9: Open non-existent file → error
// =============================================================================
#[test]
fn open_nonexistent_file_fails() {
    let dir = tempdir().unwrap();
    let result = SSTable::open(&dir.path().join("missing.txt"));
    assert!(matches!(result, Err(Error::Io(_))));
}

// =============================================================================
// Test 10: Out-of-order keys are re-sorted at open, every line stays readable
// =============================================================================
#[test]
fn unsorted_file_is_reindexed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "b:2\na:1\nc:3\n").unwrap();

    let sstable = SSTable::open_with(&path, 0, Some(0.01)).unwrap();
    assert_eq!(sstable.meta().min_key, b"a");
    assert_eq!(sstable.meta().max_key, b"c");
    assert_eq!(sstable.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(sstable.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(sstable.get(b"c").unwrap(), Some(b"3".to_vec()));

    let offsets: Vec<u64> = sstable.index().iter().map(|e| e.offset).collect();
    assert_eq!(offsets, vec![4, 0, 8]);
}

// =============================================================================
// Test 11: File rewritten underneath the index surfaces an error, not a miss
// =============================================================================
#[test]
fn changed_file_after_open_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "a:1\nb:2\n").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    fs::write(&path, "x:9\ny:8\n").unwrap();

    assert!(matches!(sstable.get(b"b"), Err(Error::Corruption(_))));
}

// =============================================================================
// Test 12: A key containing the separator does not read back (format limit)
// =============================================================================
#[test]
fn key_with_separator_is_not_recoverable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sstable_0.txt");

    let mut mt = MemTable::new();
    mt.set(b"ns:key".to_vec(), b"v".to_vec());
    mt.flush(&path).unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"ns:key").unwrap(), None);
    // The line is indexed under the text before the first separator.
    assert_eq!(sstable.get(b"ns").unwrap(), Some(b"key:v".to_vec()));
}

// =============================================================================
// Test 13: Repeated keys resolve to the first line in the file
// =============================================================================
#[test]
fn repeated_key_returns_first_occurrence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    let mut contents = String::from("a:0\n");
    for i in 1..=6 {
        contents.push_str(&format!("k:v{i}\n"));
    }
    contents.push_str("z:9\n");
    fs::write(&path, contents).unwrap();

    for bloom in [None, Some(0.01)] {
        let sstable = SSTable::open_with(&path, 0, bloom).unwrap();
        assert_eq!(sstable.len(), 8);
        assert_eq!(sstable.get(b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(sstable.get(b"a").unwrap(), Some(b"0".to_vec()));
        assert_eq!(sstable.get(b"z").unwrap(), Some(b"9".to_vec()));
    }
}

// =============================================================================
// Test 14: Repeated keys out of order keep file order after re-sorting
// =============================================================================
#[test]
fn repeated_key_after_resort_returns_first_occurrence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test_sstable.txt");
    fs::write(&path, "m:first\nz:9\nm:second\na:0\n").unwrap();

    let sstable = SSTable::open(&path).unwrap();
    assert_eq!(sstable.get(b"m").unwrap(), Some(b"first".to_vec()));
    assert_eq!(sstable.get(b"a").unwrap(), Some(b"0".to_vec()));
}
