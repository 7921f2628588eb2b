//! KLL Sketch: a quantile sketch with normalized-rank error guarantees (Karnin 2016).
//!
//! Items are kept in a stack of levels with exponentially shrinking occupancy targets;
//! when a level overflows it is randomly halved and the survivors merged into the level
//! above, so total retained weight always equals the number of items seen.

use crate::common::serde::{self, Cursor};
use crate::common::validation::{validate_byte_size, validate_k, validate_min_size, validate_rank};
use crate::common::{Mergeable, Result, Sketch, SketchError};
use crate::quantiles::kll_helper::{
    level_capacity, merge_sorted_arrays, normalized_rank_error, randomly_halve, MIN_LEVEL_WIDTH,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const FAMILY_ID: u8 = 15;
const SERIAL_VERSION: u8 = 1;

/// A quantile sketch with normalized-rank error guarantees.
///
/// # Examples
/// ```
/// use sketch_core::quantiles::KllSketch;
///
/// let mut kll = KllSketch::new(200).unwrap();
/// for i in 0..10_000 {
///     kll.update(i as f64);
/// }
/// let median = kll.get_quantile(0.5).unwrap();
/// assert!((median - 5000.0).abs() < 200.0);
/// ```
#[derive(Clone, Debug)]
pub struct KllSketch {
    k: u16,
    /// `levels[0]` is the base level (may be unsorted); `levels[h]` for `h >= 1` is kept
    /// sorted ascending at all times.
    levels: Vec<Vec<f64>>,
    is_level_zero_sorted: bool,
    n: u64,
    min_value: f64,
    max_value: f64,
    rng: SmallRng,
}

impl KllSketch {
    /// Smallest accepted `k`.
    pub const MIN_K: u16 = 8;
    /// Default `k`: roughly 1.65% normalized rank error.
    pub const DEFAULT_K: u16 = 200;

    /// Builds a KLL sketch with accuracy parameter `k`, seeded from the OS.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `k < 8`.
    pub fn new(k: u16) -> Result<Self> {
        validate_k(k)?;
        Ok(KllSketch {
            k,
            levels: vec![Vec::new()],
            is_level_zero_sorted: true,
            n: 0,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
            rng: SmallRng::from_os_rng(),
        })
    }

    /// Builds a KLL sketch with accuracy parameter `k` and a deterministic RNG seed, for
    /// reproducible randomized compaction across runs.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `k < 8`.
    pub fn with_seed(k: u16, seed: u64) -> Result<Self> {
        validate_k(k)?;
        Ok(KllSketch {
            k,
            levels: vec![Vec::new()],
            is_level_zero_sorted: true,
            n: 0,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Sketch with the default `k` (200), seeded from the OS.
    pub fn default_k() -> Self {
        Self::new(Self::DEFAULT_K).unwrap()
    }

    /// The configured accuracy parameter.
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

    /// Number of items currently retained across all levels.
    pub fn num_retained(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Single-sided normalized rank error for this sketch's `k`.
    pub fn normalized_rank_error(k: u16) -> f64 {
        normalized_rank_error(k, false)
    }

    /// Normalized rank error for PMF/CDF bucket queries at this sketch's `k`.
    pub fn normalized_rank_error_pmf(k: u16) -> f64 {
        normalized_rank_error(k, true)
    }

    /// Adds `value`, unconditionally: the reference sketch has no rejection gate on
    /// `update`, so neither does this one.
    pub fn update(&mut self, value: f64) {
        self.n += 1;
        self.min_value = self.min_value.min(value);
        self.max_value = self.max_value.max(value);

        if self.levels[0].len() as u32 >= self.level_cap(0) {
            self.compress_while_updating();
        }
        self.levels[0].push(value);
        self.is_level_zero_sorted = false;
    }

    fn level_cap(&self, height: u8) -> u32 {
        level_capacity(self.k, self.levels.len() as u8, height, MIN_LEVEL_WIDTH)
    }

    fn compress_while_updating(&mut self) {
        let mut level: usize = 0;
        loop {
            let num_levels = self.levels.len() as u8;
            if level as u8 >= num_levels {
                break;
            }
            let cap = level_capacity(self.k, num_levels, level as u8, MIN_LEVEL_WIDTH) as usize;
            if self.levels[level].len() < cap {
                break;
            }
            if level + 1 == self.levels.len() {
                self.levels.push(Vec::new());
            }
            self.compact_level(level);
            level += 1;
        }
    }

    fn compact_level(&mut self, level: usize) {
        let mut to_compact = std::mem::take(&mut self.levels[level]);
        let leftover = if to_compact.len() % 2 == 1 {
            Some(to_compact.remove(0))
        } else {
            None
        };
        if level == 0 && !self.is_level_zero_sorted {
            to_compact.sort_by(|a, b| a.partial_cmp(b).unwrap());
        }
        let halved = randomly_halve(&to_compact, &mut self.rng);
        if self.levels[level + 1].is_empty() {
            self.levels[level + 1] = halved;
        } else {
            self.levels[level + 1] = merge_sorted_arrays(&halved, &self.levels[level + 1]);
        }
        self.levels[level] = leftover.into_iter().collect();
        if level == 0 {
            self.is_level_zero_sorted = true;
        }
    }

    fn weighted_items(&self) -> Vec<(f64, u64)> {
        let mut items = Vec::with_capacity(self.num_retained());
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << h;
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
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << h;
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
        self.validate_split_points(split_points)?;
        if self.n == 0 {
            return Err(SketchError::Empty {
                operation: "get_pmf".to_string(),
            });
        }
        let mut buckets = vec![0u64; split_points.len() + 1];
        for (h, level) in self.levels.iter().enumerate() {
            let weight = 1u64 << h;
            for &v in level {
                let bucket = split_points.partition_point(|&sp| v >= sp);
                buckets[bucket] += weight;
            }
        }
        Ok(buckets.into_iter().map(|c| c as f64 / self.n as f64).collect())
    }

    /// Cumulative distribution: like [`Self::get_pmf`] but each bucket accumulates every
    /// bucket at or below it.
    ///
    /// # Errors
    /// Same as [`Self::get_pmf`].
    pub fn get_cdf(&self, split_points: &[f64]) -> Result<Vec<f64>> {
        let pmf = self.get_pmf(split_points)?;
        let mut cumulative = 0.0;
        Ok(pmf
            .into_iter()
            .map(|p| {
                cumulative += p;
                cumulative
            })
            .collect())
    }

    fn validate_split_points(&self, split_points: &[f64]) -> Result<()> {
        for w in split_points.windows(2) {
            if !(w[0] < w[1]) {
                return Err(SketchError::InvalidArgument {
                    param: "split_points".to_string(),
                    value: format!("{:?}", split_points),
                    constraint: "must be strictly increasing".to_string(),
                });
            }
        }
        if split_points.iter().any(|v| v.is_nan()) {
            return Err(SketchError::InvalidArgument {
                param: "split_points".to_string(),
                value: format!("{:?}", split_points),
                constraint: "must not contain NaN".to_string(),
            });
        }
        Ok(())
    }
}

impl Sketch for KllSketch {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        KllSketch::update(self, *item);
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
        serde::write_u8(&mut buf, self.is_level_zero_sorted as u8);
        serde::write_u32(&mut buf, self.k as u32);
        serde::write_u64(&mut buf, self.n);
        serde::write_f64(&mut buf, self.min_value);
        serde::write_f64(&mut buf, self.max_value);
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
                reason: format!("expected KLL family id {FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported KLL serial version {ser_ver}"),
            });
        }
        let _flags = cursor.read_u8()?;
        let is_level_zero_sorted = cursor.read_u8()? != 0;
        let k = cursor.read_u32()? as u16;
        let n = cursor.read_u64()?;
        let min_value = cursor.read_f64()?;
        let max_value = cursor.read_f64()?;
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
        Ok(KllSketch {
            k,
            levels,
            is_level_zero_sorted,
            n,
            min_value,
            max_value,
            rng: SmallRng::from_os_rng(),
        })
    }
}

impl Mergeable for KllSketch {
    /// Merges `other` into `self`. Level 0 items are replayed through `update` (so they
    /// correctly cascade any needed compaction); higher levels are merged directly since
    /// both are already sorted, then the whole stack is re-compacted to its target
    /// capacity.
    ///
    /// # Errors
    /// Returns [`SketchError::IncompatibleSketch`] if `k` differs between sketches.
    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.k != other.k {
            return Err(SketchError::IncompatibleSketch {
                reason: format!("k mismatch: {} vs {}", self.k, other.k),
            });
        }
        if other.n == 0 {
            return Ok(());
        }
        self.min_value = self.min_value.min(other.min_value);
        self.max_value = self.max_value.max(other.max_value);

        let other_level_zero = if other.is_level_zero_sorted {
            other.levels[0].clone()
        } else {
            let mut sorted = other.levels[0].clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            sorted
        };

        for h in 1..other.levels.len() {
            while self.levels.len() <= h {
                self.levels.push(Vec::new());
            }
            self.levels[h] = merge_sorted_arrays(&self.levels[h], &other.levels[h]);
        }
        self.n += other.n - other_level_zero.len() as u64;
        for v in other_level_zero {
            self.update(v);
        }
        self.compress_while_updating();
        Ok(())
    }
}

/// Alias retained for call sites that spell out the element type explicitly.
pub type KllFloatSketch = KllSketch;
