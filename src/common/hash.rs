//! Hashing and canonicalization for data sketches
//!
//! All sketch families that hash values (theta/tuple set operations, frequent-items'
//! reverse-purge map) share one 64-bit primitive and one canonicalization rule so that
//! two libraries fed the same stream agree bit-for-bit on every hash.

use xxhash_rust::xxh64::xxh64;

/// 64-bit hash, compatible with the reference `xxHash64` implementation used by sibling
/// libraries. Deterministic across platforms for identical byte inputs.
///
/// # Examples
/// ```
/// use sketch_core::common::hash::hash64;
///
/// let a = hash64(b"hello world", 0);
/// let b = hash64(b"hello world", 0);
/// assert_eq!(a, b);
/// ```
pub fn hash64(data: &[u8], seed: u64) -> u64 {
    xxh64(data, seed)
}

/// Canonicalizes a double before hashing: `-0.0` becomes `+0.0`, and any NaN bit pattern
/// collapses to a single canonical NaN bit pattern (matching the reference Java
/// `Double.doubleToLongBits` quiet NaN, `0x7ff8000000000000`).
///
/// This must run before every floating-point value is hashed, so that `-0.0` and `0.0`
/// (and every NaN payload) land in the same bucket.
pub fn canonicalize_f64(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else if x.is_nan() {
        f64::from_bits(0x7ff8000000000000)
    } else {
        x
    }
}

/// Hashes a canonicalized double's raw little-endian bytes.
pub fn hash_f64(value: f64, seed: u64) -> u64 {
    hash64(&canonicalize_f64(value).to_le_bytes(), seed)
}

/// Hashes a canonicalized `f32`, widened to `f64` first.
pub fn hash_f32(value: f32, seed: u64) -> u64 {
    hash_f64(value as f64, seed)
}

/// Hashes the raw little-endian bytes of an `i64`. Narrower signed integer types should
/// widen to `i64` before calling this.
pub fn hash_i64(value: i64, seed: u64) -> u64 {
    hash64(&value.to_le_bytes(), seed)
}

/// Hashes the raw little-endian bytes of a `u64`. Narrower unsigned integer types should
/// widen to `u64` before calling this.
pub fn hash_u64(value: u64, seed: u64) -> u64 {
    hash64(&value.to_le_bytes(), seed)
}

/// Hashes a string's raw UTF-8 bytes.
pub fn hash_str(value: &str, seed: u64) -> u64 {
    hash64(value.as_bytes(), seed)
}

/// Derives the 16-bit seed fingerprint embedded in every theta/tuple serialization: the
/// two low bytes of `hash64` of the seed's little-endian bytes.
///
/// Merges, unions, intersections, and A-not-B operations that see a mismatched
/// `seed_hash` fail with [`crate::common::SketchError::SeedMismatch`].
///
/// # Examples
/// ```
/// use sketch_core::common::hash::seed_hash;
///
/// assert_eq!(seed_hash(9001), seed_hash(9001));
/// assert_ne!(seed_hash(9001), seed_hash(1));
/// ```
pub fn seed_hash(seed: u64) -> u16 {
    let h = hash64(&seed.to_le_bytes(), 0);
    (h & 0xffff) as u16
}
