//! Quantiles (classic) sketch: an explicit size-`2k` base buffer feeding a binary
//! ripple-carry stack of size-`k` compactor levels.
//!
//! Unlike [`crate::quantiles::kll::KllSketch`] (which compacts level 0 as soon as it
//! overflows its own, generally larger than `k`, capacity), the classic sketch always
//! compacts at exactly `2k` base-buffer items and propagates with binary-counter carry
//! semantics: `bit_pattern` tracks which levels are occupied, mirroring the bits of the
//! number of propagations performed so far.

use crate::common::serde::{self, Cursor};
use crate::common::validation::{validate_byte_size, validate_k, validate_min_size, validate_rank};
use crate::common::{Mergeable, Result, Sketch, SketchError};
use crate::quantiles::kll_helper::{merge_sorted_arrays, randomly_halve};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const FAMILY_ID: u8 = 4;
const SERIAL_VERSION: u8 = 3;

/// Classic ripple-carry quantiles sketch.
///
/// # Examples
/// ```
/// use sketch_core::quantiles::QuantilesSketch;
///
/// let mut q = QuantilesSketch::new(128).unwrap();
/// for i in 0..10_000 {
///     q.update(i as f64);
/// }
/// let median = q.get_quantile(0.5).unwrap();
/// assert!((median - 5000.0).abs() < 500.0);
/// ```
#[derive(Clone, Debug)]
pub struct QuantilesSketch {
    k: u16,
    base_buffer: Vec<f64>,
    levels: Vec<Vec<f64>>,
    bit_pattern: u64,
    n: u64,
    min_value: f64,
    max_value: f64,
    rng: SmallRng,
}

impl QuantilesSketch {
    /// Smallest accepted `k`.
    pub const MIN_K: u16 = 8;
    /// Default `k`.
    pub const DEFAULT_K: u16 = 128;

    /// Builds a classic quantiles sketch with per-level capacity `k`, seeded from the OS.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `k < 8`.
    pub fn new(k: u16) -> Result<Self> {
        validate_k(k)?;
        Ok(QuantilesSketch {
            k,
            base_buffer: Vec::with_capacity(2 * k as usize),
            levels: Vec::new(),
            bit_pattern: 0,
            n: 0,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
            rng: SmallRng::from_os_rng(),
        })
    }

    /// Builds a classic quantiles sketch with a deterministic RNG seed, for reproducible
    /// randomized zipping across runs.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `k < 8`.
    pub fn with_seed(k: u16, seed: u64) -> Result<Self> {
        validate_k(k)?;
        Ok(QuantilesSketch {
            k,
            base_buffer: Vec::with_capacity(2 * k as usize),
            levels: Vec::new(),
            bit_pattern: 0,
            n: 0,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// The configured per-level capacity.
    pub fn k(&self) -> u16 {
        self.k
    }

    /// Number of items seen.
    pub fn count(&self) -> u64 {
        self.n
    }

    /// The smallest value seen.
    pub fn min(&self) -> f64 {
        self.min_value
    }

    /// The largest value seen.
    pub fn max(&self) -> f64 {
        self.max_value
    }

    /// Normalized (one-sided) rank error for a classic sketch of accuracy `k`.
    pub fn normalized_rank_error(k: u16) -> f64 {
        1.406 / (k as f64).sqrt()
    }

    /// Adds `value` to the sketch. NaN and infinite values are ignored.
    pub fn update(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.n += 1;
        self.min_value = self.min_value.min(value);
        self.max_value = self.max_value.max(value);
        self.base_buffer.push(value);
        if self.base_buffer.len() == 2 * self.k as usize {
            self.propagate();
        }
    }

    fn propagate(&mut self) {
        self.base_buffer.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let carry = randomly_halve(&self.base_buffer, &mut self.rng);
        self.base_buffer.clear();
        self.propagate_level(0, carry);
    }

    /// Ripple-carries a size-`k` `carry` buffer into the level stack starting at
    /// `starting_level`, mirroring the reference's `in_place_propagate_carry`: walks up
    /// while the occupancy bit at each level is set, merging and re-halving, and settles
    /// `carry` into the first unoccupied level it finds.
    fn propagate_level(&mut self, starting_level: usize, mut carry: Vec<f64>) {
        let mut level = starting_level;
        let mut pattern = self.bit_pattern >> starting_level;
        loop {
            if pattern & 1 == 0 {
                while self.levels.len() <= level {
                    self.levels.push(Vec::new());
                }
                self.levels[level] = carry;
                break;
            }
            let existing = std::mem::take(&mut self.levels[level]);
            let merged = merge_sorted_arrays(&existing, &carry);
            carry = randomly_halve(&merged, &mut self.rng);
            level += 1;
            pattern >>= 1;
        }
        self.bit_pattern += 1u64 << starting_level;
    }

    fn weighted_items(&self) -> Vec<(f64, u64)> {
        let mut items: Vec<(f64, u64)> = self.base_buffer.iter().map(|&v| (v, 1u64)).collect();
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << (h + 1);
            items.extend(level.iter().map(|&v| (v, weight)));
        }
        items
    }

    /// Fraction of seen values at or below `value`.
    pub fn get_rank(&self, value: f64) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mut count = 0u64;
        count += self.base_buffer.iter().filter(|&&v| v < value).count() as u64;
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << (h + 1);
            count += level.iter().filter(|&&v| v < value).count() as u64 * weight;
        }
        count as f64 / self.n as f64
    }

    /// The value at rank `q` (a fraction in `[0, 1]`).
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `q` is outside `[0, 1]`, or
    /// [`SketchError::Empty`] if the sketch has no values.
    pub fn get_quantile(&self, q: f64) -> Result<f64> {
        validate_rank(q)?;
        if self.n == 0 {
            return Err(SketchError::Empty {
                operation: "get_quantile".to_string(),
            });
        }
        if q == 0.0 {
            return Ok(self.min_value);
        }
        if q == 1.0 {
            return Ok(self.max_value);
        }
        let mut items = self.weighted_items();
        items.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let target = ((q * self.n as f64).floor() as u64).min(self.n - 1);
        let mut cumulative = 0u64;
        for (value, weight) in items {
            cumulative += weight;
            if cumulative > target {
                return Ok(value);
            }
        }
        Ok(self.max_value)
    }

    /// Fraction of seen values falling into each bucket delimited by `split_points`
    /// (strictly increasing, non-NaN).
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `split_points` is not strictly
    /// increasing, or [`SketchError::Empty`] if the sketch has no values.
    pub fn get_pmf(&self, split_points: &[f64]) -> Result<Vec<f64>> {
        for w in split_points.windows(2) {
            if !(w[0] < w[1]) {
                return Err(SketchError::InvalidArgument {
                    param: "split_points".to_string(),
                    value: format!("{:?}", split_points),
                    constraint: "must be strictly increasing".to_string(),
                });
            }
        }
        if self.n == 0 {
            return Err(SketchError::Empty {
                operation: "get_pmf".to_string(),
            });
        }
        let mut buckets = vec![0u64; split_points.len() + 1];
        for &v in &self.base_buffer {
            let bucket = split_points.partition_point(|&sp| v >= sp);
            buckets[bucket] += 1;
        }
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << (h + 1);
            for &v in level {
                let bucket = split_points.partition_point(|&sp| v >= sp);
                buckets[bucket] += weight;
            }
        }
        Ok(buckets.into_iter().map(|c| c as f64 / self.n as f64).collect())
    }
}

impl Sketch for QuantilesSketch {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        QuantilesSketch::update(self, *item);
    }

    fn estimate(&self) -> f64 {
        self.get_quantile(0.5).unwrap_or(0.0)
    }

    fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        serde::write_u8(&mut buf, FAMILY_ID);
        serde::write_u8(&mut buf, SERIAL_VERSION);
        let flags: u8 = if self.n == 0 { 1 } else { 0 };
        serde::write_u8(&mut buf, flags);
        serde::write_u32(&mut buf, self.k as u32);
        serde::write_u64(&mut buf, self.n);
        serde::write_u64(&mut buf, self.bit_pattern);
        serde::write_f64(&mut buf, self.min_value);
        serde::write_f64(&mut buf, self.max_value);
        serde::write_u32(&mut buf, self.base_buffer.len() as u32);
        for &v in &self.base_buffer {
            serde::write_f64(&mut buf, v);
        }
        serde::write_u32(&mut buf, self.levels.len() as u32);
        for level in &self.levels {
            serde::write_u32(&mut buf, level.len() as u32);
            for &v in level {
                serde::write_f64(&mut buf, v);
            }
        }
        buf
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, SketchError> {
        validate_byte_size(bytes.len())?;
        validate_min_size(bytes.len(), 4)?;
        let mut cursor = Cursor::new(bytes);
        let family_id = cursor.read_u8()?;
        if family_id != FAMILY_ID {
            return Err(SketchError::CorruptInput {
                reason: format!("expected Quantiles family id {FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported Quantiles serial version {ser_ver}"),
            });
        }
        let _flags = cursor.read_u8()?;
        let k = cursor.read_u32()? as u16;
        let n = cursor.read_u64()?;
        let bit_pattern = cursor.read_u64()?;
        let min_value = cursor.read_f64()?;
        let max_value = cursor.read_f64()?;
        let base_len = cursor.read_u32()? as usize;
        let mut base_buffer = Vec::with_capacity(base_len);
        for _ in 0..base_len {
            base_buffer.push(cursor.read_f64()?);
        }
        let num_levels = cursor.read_u32()? as usize;
        let mut levels = Vec::with_capacity(num_levels);
        for _ in 0..num_levels {
            let len = cursor.read_u32()? as usize;
            let mut level = Vec::with_capacity(len);
            for _ in 0..len {
                level.push(cursor.read_f64()?);
            }
            levels.push(level);
        }
        Ok(QuantilesSketch {
            k,
            base_buffer,
            levels,
            bit_pattern,
            n,
            min_value,
            max_value,
            rng: SmallRng::from_os_rng(),
        })
    }
}

impl Mergeable for QuantilesSketch {
    /// Merges `other` into `self`: `other`'s base buffer is replayed item-by-item through
    /// `update` (each is a single raw value, so this is exact and cheap), while each of
    /// `other`'s already-compacted levels is ripple-carried directly into `self`'s level
    /// stack via [`Self::propagate_level`] rather than being replayed through `update` at
    /// its level weight — mirroring the reference's `in_place_propagate_carry` /
    /// `merge_two_size_k_buffers` "merge_into" path, which moves a size-`k` level buffer
    /// wholesale instead of re-deriving it from `2^(h+1)` individual updates.
    ///
    /// # Errors
    /// Returns [`SketchError::IncompatibleSketch`] if `k` differs between sketches.
    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.k != other.k {
            return Err(SketchError::IncompatibleSketch {
                reason: format!("k mismatch: {} vs {}", self.k, other.k),
            });
        }
        let other_level_n = other.n - other.base_buffer.len() as u64;
        for &v in &other.base_buffer {
            self.update(v);
        }
        let mut pattern = other.bit_pattern;
        let mut level = 0usize;
        while pattern != 0 {
            if pattern & 1 == 1 {
                self.propagate_level(level, other.levels[level].clone());
            }
            level += 1;
            pattern >>= 1;
        }
        self.n += other_level_n;
        self.min_value = self.min_value.min(other.min_value);
        self.max_value = self.max_value.max(other.max_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_empty() {
        let q = QuantilesSketch::new(128).unwrap();
        assert!(Sketch::is_empty(&q));
    }

    #[test]
    fn test_invalid_k() {
        assert!(QuantilesSketch::new(4).is_err());
    }

    #[test]
    fn test_quantile_accuracy_uniform_stream() {
        let mut q = QuantilesSketch::with_seed(128, 3).unwrap();
        for i in 0..10_000 {
            q.update(i as f64);
        }
        let p50 = q.get_quantile(0.5).unwrap();
        let bound = QuantilesSketch::normalized_rank_error(128) * 10_000.0;
        assert!((p50 - 5000.0).abs() < bound * 3.0, "p50={p50}");
    }

    #[test]
    fn test_min_max() {
        let mut q = QuantilesSketch::new(128).unwrap();
        q.update(10.0);
        q.update(100.0);
        q.update(50.0);
        assert_eq!(q.min(), 10.0);
        assert_eq!(q.max(), 100.0);
    }

    #[test]
    fn test_merge_combines_counts() {
        let mut a = QuantilesSketch::with_seed(128, 1).unwrap();
        let mut b = QuantilesSketch::with_seed(128, 2).unwrap();
        for i in 0..5000 {
            a.update(i as f64);
        }
        for i in 5000..10_000 {
            b.update(i as f64);
        }
        a.merge(&b).unwrap();
        assert_eq!(a.count(), 10_000);
        assert_eq!(a.max(), 9999.0);
    }

    #[test]
    fn test_merge_with_compacted_levels_preserves_count_and_accuracy() {
        // k=8 forces both sketches well past their first few carry propagations, so
        // `merge` exercises `propagate_level` against a non-trivial `bit_pattern`, not
        // just a leftover base buffer.
        let mut a = QuantilesSketch::with_seed(8, 7).unwrap();
        let mut b = QuantilesSketch::with_seed(8, 9).unwrap();
        for i in 0..20_000 {
            a.update(i as f64);
        }
        for i in 20_000..40_000 {
            b.update(i as f64);
        }
        assert!(a.bit_pattern > 0);
        assert!(b.bit_pattern > 0);
        a.merge(&b).unwrap();
        assert_eq!(a.count(), 40_000);
        assert_eq!(a.min(), 0.0);
        assert_eq!(a.max(), 39_999.0);
        let p50 = a.get_quantile(0.5).unwrap();
        let bound = QuantilesSketch::normalized_rank_error(8) * 40_000.0;
        assert!((p50 - 20_000.0).abs() < bound * 3.0, "p50={p50}");
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut q = QuantilesSketch::with_seed(128, 11).unwrap();
        for i in 0..1000 {
            q.update(i as f64);
        }
        let bytes = Sketch::serialize(&q);
        let restored = QuantilesSketch::deserialize(&bytes).unwrap();
        assert_eq!(q.k(), restored.k());
        assert_eq!(q.count(), restored.count());
    }
}
