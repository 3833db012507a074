use fnv::FnvHasher;
use murmur3::murmur3_32;
use std::hash::Hasher;
use std::io::Cursor;

/// Maps a key to the 64-bit fingerprint used for bucket selection.
///
/// The low `k` bits of the fingerprint pick the bucket a key belongs to,
/// so the fingerprint width bounds the partition depth at 64.
pub type Fingerprint = fn(&[u8]) -> u64;

/// A type alias for the hash function used in the Bloom filter.
///
/// This function takes an input item and computes multiple hash indices
/// for the Bloom filter's bit vector.
///
/// **Parameters:**
///
/// - `item: &[u8]`
///   - A byte slice representing the item to be hashed.
/// - `num_hashes: usize`
///   - The number of hash values to compute for the item.
/// - `num_bits: usize`
///   - The size of the Bloom filter's bit vector. This ensures that
///     the generated hash indices are within valid bounds.
///
/// **Returns:**
///
/// - `Vec<u32>`
///   - A vector of hash indices corresponding to positions in the bit vector.
pub type HashFunction = fn(&[u8], usize, usize) -> Vec<u32>;

/// Number of bits in a fingerprint, and therefore the deepest partition.
pub const FINGERPRINT_BITS: u32 = u64::BITS;

/// 64-bit FNV-1a over the key bytes.
pub fn default_fingerprint(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish()
}

pub(crate) fn hash_murmur32(key: &[u8]) -> u32 {
    let mut cursor = Cursor::new(key);
    // Reading from an in-memory cursor cannot fail
    murmur3_32(&mut cursor, 0).unwrap_or_default()
}

pub(crate) fn hash_fnv32(key: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish() as u32
}

/// Double hashing over Murmur3 and FNV: `h1 + i * h2 (mod num_bits)`.
pub fn default_hash_function(
    item: &[u8],
    num_hashes: usize,
    num_bits: usize,
) -> Vec<u32> {
    let h1 = hash_murmur32(item) as u64;
    let h2 = hash_fnv32(item) as u64;
    (0..num_hashes as u64)
        .map(|i| (h1.wrapping_add(i.wrapping_mul(h2)) % num_bits as u64) as u32)
        .collect()
}

// Classic general purpose string hashes collected by Arash Partow,
// http://www.partow.net/programming/hashfunctions/

fn hash_sdbm(key: &[u8]) -> u64 {
    key.iter().fold(0u64, |hash, &c| {
        (c as u64)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}

fn hash_djb(key: &[u8]) -> u64 {
    key.iter().fold(5381u64, |hash, &c| {
        (hash << 5).wrapping_add(hash).wrapping_add(c as u64)
    })
}

fn hash_dek(key: &[u8]) -> u64 {
    key.iter().fold(key.len() as u64, |hash, &c| {
        ((hash << 5) ^ (hash >> 27)) ^ c as u64
    })
}

fn hash_js(key: &[u8]) -> u64 {
    key.iter().fold(1_315_423_911u64, |hash, &c| {
        hash ^ (hash << 5).wrapping_add(c as u64).wrapping_add(hash >> 2)
    })
}

fn hash_pjw(key: &[u8]) -> u64 {
    const BITS: u32 = u64::BITS;
    const THREE_QUARTERS: u32 = BITS * 3 / 4;
    const ONE_EIGHTH: u32 = BITS / 8;
    const HIGH_BITS: u64 = 0xFFFF_FFFFu64 << (BITS - ONE_EIGHTH);

    key.iter().fold(0u64, |hash, &c| {
        let hash = (hash << ONE_EIGHTH).wrapping_add(c as u64);
        let test = hash & HIGH_BITS;
        if test != 0 {
            (hash ^ (test >> THREE_QUARTERS)) & !HIGH_BITS
        } else {
            hash
        }
    })
}

/// Probes built from five independent classic string hashes
/// (SDBM, DJB, DEK, JS, PJW).
///
/// Beyond five probes the extra positions come from double hashing
/// SDBM with DJB.
pub fn partow_hash_function(
    item: &[u8],
    num_hashes: usize,
    num_bits: usize,
) -> Vec<u32> {
    let classic: [fn(&[u8]) -> u64; 5] =
        [hash_sdbm, hash_djb, hash_dek, hash_js, hash_pjw];
    let m = num_bits as u64;

    (0..num_hashes)
        .map(|i| {
            let h = match classic.get(i) {
                Some(f) => f(item),
                None => hash_sdbm(item)
                    .wrapping_add((i as u64).wrapping_mul(hash_djb(item))),
            };
            (h % m) as u32
        })
        .collect()
}

pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize
}

pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    ((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize
}

/// False positive probability of a filter with `num_bits` bits and
/// `num_hashes` probes after `items` distinct insertions:
/// `(1 - e^(-h * n / m))^h`.
///
/// In the engine a false positive drops a genuinely new key for the rest
/// of the phase, so this is also the expected under-forwarding rate for
/// a phase that has already forwarded `items` keys.
pub fn expected_false_positive_rate(
    num_bits: usize,
    num_hashes: usize,
    items: usize,
) -> f64 {
    if num_bits == 0 {
        return 1.0;
    }
    let h = num_hashes as f64;
    let exponent = -h * items as f64 / num_bits as f64;
    (1.0 - exponent.exp()).powf(h)
}
