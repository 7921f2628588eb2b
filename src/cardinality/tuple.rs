//! Tuple sketch: a theta-shaped table generalized to carry a `Summary` payload per hash,
//! parameterized by an update policy (how a new/matching key's summary evolves) and a
//! union policy (how two sketches' summaries combine on a hash collision).
//!
//! [`array_of_doubles`] instantiates `Summary = Vec<f64>` with element-wise addition, the
//! concrete form the reference implementation calls `array_of_doubles_sketch`.

pub mod array_of_doubles;

use crate::common::hash::{hash64, seed_hash};
use crate::common::validation::{validate_lg_k, validate_p};
use crate::common::{Result, SketchError};
use crate::cardinality::theta::MAX_THETA;

const MIN_LG_K: u8 = 5;

/// Governs how a tuple sketch's summary evolves on `update`.
pub trait SummaryUpdatePolicy<S> {
    /// The type of value carried by each `update` call.
    type UpdateValue: ?Sized;

    /// Builds the zero-value summary for a newly-inserted key.
    fn create_summary(&self) -> S;

    /// Folds `update_value` into an existing (or freshly created) summary.
    fn update_summary(&self, summary: &mut S, update_value: &Self::UpdateValue);
}

/// Governs how two summaries combine when a union operation finds the same hash in both
/// inputs.
pub trait SummaryUnionPolicy<S> {
    /// Combines `right` into `left` in place.
    fn combine(&self, left: &mut S, right: &S);
}

/// A theta-shaped `(hash, Summary)` table.
#[derive(Debug, Clone)]
pub struct TupleSketch<S: Clone, P> {
    lg_cur_size: u8,
    lg_nom_size: u8,
    hashes: Vec<u64>,
    summaries: Vec<Option<S>>,
    num_entries: u32,
    theta: u64,
    p: f32,
    seed: u64,
    policy: P,
}

impl<S: Clone, P> TupleSketch<S, P> {
    /// Builds a tuple sketch with `k = 2^lg_k` nominal entries.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `lg_k` is outside `[5, 26]` or `p` is
    /// outside `(0.0, 1.0]`.
    pub fn new(lg_k: u8, p: f32, seed: u64, policy: P) -> Result<Self> {
        validate_lg_k(lg_k)?;
        validate_p(p)?;
        let lg_cur_size = MIN_LG_K.min(lg_k);
        let starting_theta = ((p as f64) * MAX_THETA as f64).floor() as u64;
        let size = 1usize << lg_cur_size;
        Ok(TupleSketch {
            lg_cur_size,
            lg_nom_size: lg_k,
            hashes: vec![0u64; size],
            summaries: (0..size).map(|_| None).collect(),
            num_entries: 0,
            theta: starting_theta,
            p,
            seed,
            policy,
        })
    }

    /// `true` iff no items have ever been accepted and no pre-sampling occurred.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0 && self.theta == MAX_THETA
    }

    /// The current sampling threshold.
    pub fn theta(&self) -> u64 {
        self.theta
    }

    /// Number of entries currently held.
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// The 16-bit fingerprint of this sketch's seed.
    pub fn seed_hash(&self) -> u16 {
        seed_hash(self.seed)
    }

    /// The estimated number of distinct keys.
    pub fn estimate(&self) -> f64 {
        if self.theta == MAX_THETA {
            return self.num_entries as f64;
        }
        self.num_entries as f64 / (self.theta as f64 / MAX_THETA as f64)
    }

    fn mask(&self) -> u64 {
        (1u64 << self.lg_cur_size) - 1
    }

    fn stride_for(&self, hash: u64) -> u64 {
        (((hash >> self.lg_cur_size) & 0x7f) | 1) as u64
    }

    /// Updates the summary for `key`'s hash, creating it via the policy if absent.
    pub fn update(&mut self, key: &[u8], update_value: &P::UpdateValue)
    where
        P: SummaryUpdatePolicy<S>,
    {
        let hash = hash64(key, self.seed) & MAX_THETA;
        if hash == 0 || hash >= self.theta {
            return;
        }
        self.insert_or_update(hash, update_value);
    }

    fn insert_or_update(&mut self, hash: u64, update_value: &P::UpdateValue)
    where
        P: SummaryUpdatePolicy<S>,
    {
        let mask = self.mask();
        let mut probe = hash & mask;
        let stride = self.stride_for(hash);
        loop {
            if self.hashes[probe as usize] == hash {
                let summary = self.summaries[probe as usize].as_mut().unwrap();
                self.policy.update_summary(summary, update_value);
                return;
            }
            if self.hashes[probe as usize] == 0 {
                break;
            }
            probe = (probe + stride) & mask;
        }
        let mut summary = self.policy.create_summary();
        self.policy.update_summary(&mut summary, update_value);
        self.hashes[probe as usize] = hash;
        self.summaries[probe as usize] = Some(summary);
        self.num_entries += 1;

        let size = 1u64 << self.lg_cur_size;
        if self.num_entries as f64 > 0.5 * size as f64 && self.lg_cur_size < self.lg_nom_size + 1 {
            self.resize();
        } else if self.num_entries as f64 >= (15.0 / 16.0) * (1u64 << self.lg_nom_size) as f64 {
            self.rebuild();
        }
    }

    fn resize(&mut self) {
        let new_lg_size = (self.lg_cur_size + 1).min(self.lg_nom_size + 1);
        self.rehash_into(new_lg_size, self.theta);
    }

    fn rebuild(&mut self) {
        let target = 1usize << self.lg_nom_size;
        let mut values: Vec<u64> = self.hashes.iter().copied().filter(|&h| h != 0).collect();
        if values.len() <= target {
            return;
        }
        values.sort_unstable();
        let new_theta = values[target];
        self.rehash_into(self.lg_cur_size, new_theta);
    }

    fn rehash_into(&mut self, new_lg_size: u8, new_theta: u64) {
        let old_hashes = std::mem::take(&mut self.hashes);
        let old_summaries = std::mem::take(&mut self.summaries);
        let survivors: Vec<(u64, S)> = old_hashes
            .into_iter()
            .zip(old_summaries)
            .filter_map(|(h, s)| if h != 0 && h < new_theta { Some((h, s.unwrap())) } else { None })
            .collect();
        self.lg_cur_size = new_lg_size;
        self.theta = new_theta;
        let size = 1usize << new_lg_size;
        self.hashes = vec![0u64; size];
        self.summaries = (0..size).map(|_| None).collect();
        self.num_entries = 0;
        for (h, s) in survivors {
            let mask = self.mask();
            let mut probe = h & mask;
            let stride = self.stride_for(h);
            while self.hashes[probe as usize] != 0 {
                probe = (probe + stride) & mask;
            }
            self.hashes[probe as usize] = h;
            self.summaries[probe as usize] = Some(s);
            self.num_entries += 1;
        }
    }

    /// Iterates over the live `(hash, &summary)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (u64, &S)> {
        self.hashes
            .iter()
            .zip(self.summaries.iter())
            .filter_map(|(&h, s)| if h != 0 { Some((h, s.as_ref().unwrap())) } else { None })
    }

    /// Produces an immutable compacted snapshot.
    pub fn compact(&self) -> CompactTupleSketch<S> {
        let entries: Vec<(u64, S)> = self.entries().map(|(h, s)| (h, s.clone())).collect();
        CompactTupleSketch {
            entries,
            theta: self.theta,
            seed_hash: self.seed_hash(),
            is_empty: self.is_empty(),
        }
    }
}

/// An immutable compacted tuple sketch.
#[derive(Debug, Clone)]
pub struct CompactTupleSketch<S> {
    entries: Vec<(u64, S)>,
    theta: u64,
    seed_hash: u16,
    is_empty: bool,
}

impl<S: Clone> CompactTupleSketch<S> {
    /// Reconstructs a compacted sketch from its raw parts, typically during
    /// deserialization.
    pub fn from_parts(entries: Vec<(u64, S)>, theta: u64, seed_hash: u16, is_empty: bool) -> Self {
        CompactTupleSketch {
            entries,
            theta,
            seed_hash,
            is_empty,
        }
    }

    /// The retained `(hash, summary)` entries.
    pub fn entries(&self) -> &[(u64, S)] {
        &self.entries
    }

    /// The sampling threshold at compaction time.
    pub fn theta(&self) -> u64 {
        self.theta
    }

    /// The 16-bit seed fingerprint.
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// `true` iff this sketch holds no entries and was never pre-sampled.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// The estimated number of distinct keys.
    pub fn estimate(&self) -> f64 {
        if self.theta == MAX_THETA {
            return self.entries.len() as f64;
        }
        self.entries.len() as f64 / (self.theta as f64 / MAX_THETA as f64)
    }

    /// Unions `self` with `other` under `policy`, combining summaries on shared hashes.
    ///
    /// # Errors
    /// Returns [`SketchError::SeedMismatch`] if `self` and `other` have different seed
    /// hashes.
    pub fn union<U: SummaryUnionPolicy<S>>(&self, other: &Self, policy: &U) -> Result<Self> {
        if self.seed_hash != other.seed_hash {
            return Err(SketchError::SeedMismatch {
                expected: self.seed_hash,
                found: other.seed_hash,
            });
        }
        let theta = self.theta.min(other.theta);
        let mut merged: Vec<(u64, S)> = Vec::new();
        for &(h, ref s) in self.entries.iter().filter(|(h, _)| *h < theta) {
            merged.push((h, s.clone()));
        }
        for &(h, ref s) in other.entries.iter().filter(|(h, _)| *h < theta) {
            if let Some(existing) = merged.iter_mut().find(|(eh, _)| *eh == h) {
                policy.combine(&mut existing.1, s);
            } else {
                merged.push((h, s.clone()));
            }
        }
        Ok(CompactTupleSketch {
            is_empty: merged.is_empty() && theta == MAX_THETA,
            entries: merged,
            theta,
            seed_hash: self.seed_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumPolicy;
    impl SummaryUpdatePolicy<f64> for SumPolicy {
        type UpdateValue = f64;
        fn create_summary(&self) -> f64 {
            0.0
        }
        fn update_summary(&self, summary: &mut f64, update_value: &f64) {
            *summary += update_value;
        }
    }
    impl SummaryUnionPolicy<f64> for SumPolicy {
        fn combine(&self, left: &mut f64, right: &f64) {
            *left += right;
        }
    }

    #[test]
    fn test_update_creates_and_accumulates() {
        let mut sketch = TupleSketch::new(10, 1.0, 1, SumPolicy).unwrap();
        sketch.update(b"a", &1.0);
        sketch.update(b"a", &2.0);
        sketch.update(b"b", &5.0);
        assert_eq!(sketch.num_entries(), 2);
        let total: f64 = sketch.entries().map(|(_, s)| *s).sum();
        assert_eq!(total, 8.0);
    }

    #[test]
    fn test_compact_union_combines_summaries() {
        let mut a = TupleSketch::new(10, 1.0, 7, SumPolicy).unwrap();
        let mut b = TupleSketch::new(10, 1.0, 7, SumPolicy).unwrap();
        a.update(b"x", &3.0);
        b.update(b"x", &4.0);
        b.update(b"y", &1.0);
        let union = a.compact().union(&b.compact(), &SumPolicy).unwrap();
        assert_eq!(union.entries().len(), 2);
        let x_val = union.entries().iter().find(|(h, _)| *h == a.entries().next().unwrap().0).unwrap().1;
        assert_eq!(x_val, 7.0);
    }
}
