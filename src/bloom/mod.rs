use xxhash_rust::xxh3::xxh3_128;

/// In-memory membership filter kept next to a segment's index.
///
/// - If any checked bit is 0 the key is DEFINITELY NOT in the segment
/// - If all checked bits are 1 the key is PROBABLY in the segment
///
/// Built once when a segment is opened and never persisted, so it costs
/// nothing on disk. A negative answer lets a lookup skip both the binary
/// search and the file read.
///
/// Sizing:
///   bits_per_key = -1.44 * log2(false_positive_rate)
///   num_hashes   = bits_per_key * ln(2)
///
/// Bit positions use double hashing over the two halves of one xxh3-128 hash:
/// h_i(key) = h1 + i * h2 (mod num_bits).
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u64,
}

impl BloomFilter {
    /// Smallest filter ever allocated, so an empty segment still gets a valid filter.
    const MIN_BITS: u64 = 64;

    /// Create an empty filter sized for `expected_items` at the given rate.
    ///
    /// `false_positive_rate` is clamped into `[1e-6, 0.5]`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let rate = if false_positive_rate.is_finite() {
            false_positive_rate.clamp(1e-6, 0.5)
        } else {
            0.01
        };
        let bits_per_key = -1.44 * rate.log2();

        let num_bits = ((expected_items.max(1) as f64) * bits_per_key).ceil() as u64;
        let num_bits = num_bits.max(Self::MIN_BITS);
        let num_hashes = ((bits_per_key * std::f64::consts::LN_2).ceil() as u32).max(1);

        BloomFilter {
            bits: vec![0u64; num_bits.div_ceil(64) as usize],
            num_hashes,
            num_bits,
        }
    }

    /// Build a filter holding every key yielded by `keys`.
    pub fn from_keys<'a, I>(keys: I, false_positive_rate: f64) -> Self
    where
        I: ExactSizeIterator<Item = &'a [u8]>,
    {
        let mut filter = BloomFilter::new(keys.len(), false_positive_rate);
        for key in keys {
            filter.insert(key);
        }
        filter
    }

    /// Record a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = split_hash(key);
        for i in 0..self.num_hashes {
            let pos = self.bit_index(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    /// false → definitely absent. true → probably present.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = split_hash(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.bit_index(h1, h2, i);
            (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
        })
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}

fn split_hash(key: &[u8]) -> (u64, u64) {
    let hash = xxh3_128(key);
    (hash as u64, (hash >> 64) as u64)
}
