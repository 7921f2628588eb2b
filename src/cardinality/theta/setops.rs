//! Theta sketch set operations: union, intersection, A-not-B, and Jaccard similarity.
//!
//! Every operator checks `seed_hash` on each input against its own and fails with
//! [`SketchError::SeedMismatch`] on a mismatch, since combining sketches hashed under
//! different seeds would silently corrupt every comparison.

use super::{CompactThetaSketch, ResizeFactor, ThetaSketch, ThetaSketchBuilder, MAX_THETA};
use crate::common::{Result, SketchError};
use std::collections::HashSet;

fn check_seed_hash(expected: u16, found: u16) -> Result<()> {
    if expected != found {
        return Err(SketchError::SeedMismatch { expected, found });
    }
    Ok(())
}

/// Accumulates a running union across any number of theta sketches.
pub struct Union {
    table: ThetaSketch,
    min_theta: u64,
    seed_hash: u16,
}

impl Union {
    /// Starts a union with the given nominal size and seed.
    pub fn new(lg_k: u8, seed: u64) -> Result<Self> {
        let table = ThetaSketchBuilder::new()
            .set_lg_k(lg_k)
            .set_seed(seed)
            .set_resize_factor(ResizeFactor::X8)
            .build()?;
        let seed_hash = table.seed_hash();
        Ok(Union {
            table,
            min_theta: MAX_THETA,
            seed_hash,
        })
    }

    /// Folds in a mutable sketch's entries.
    ///
    /// # Errors
    /// Returns [`SketchError::SeedMismatch`] if `sketch`'s seed hash differs.
    pub fn update(&mut self, sketch: &ThetaSketch) -> Result<()> {
        check_seed_hash(self.seed_hash, sketch.seed_hash())?;
        self.min_theta = self.min_theta.min(sketch.theta());
        let cutoff = self.min_theta;
        for h in sketch.entries() {
            if h < cutoff {
                self.table.internal_update(h);
            }
        }
        Ok(())
    }

    /// Folds in a compact sketch's entries.
    ///
    /// # Errors
    /// Returns [`SketchError::SeedMismatch`] if `sketch`'s seed hash differs.
    pub fn update_compact(&mut self, sketch: &CompactThetaSketch) -> Result<()> {
        check_seed_hash(self.seed_hash, sketch.seed_hash())?;
        self.min_theta = self.min_theta.min(sketch.theta());
        let cutoff = self.min_theta;
        for &h in sketch.entries() {
            if h < cutoff {
                self.table.internal_update(h);
            }
        }
        Ok(())
    }

    /// Emits the accumulated result as a compact sketch.
    pub fn get_result(&self, ordered: bool) -> CompactThetaSketch {
        let theta = self.min_theta.min(self.table.theta());
        let mut entries: Vec<u64> = self.table.entries().filter(|&h| h < theta).collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaSketch::from_entries(entries, theta, self.seed_hash, ordered)
    }
}

fn intersect_entries(
    a: &[u64],
    theta_a: u64,
    b: &[u64],
    theta_b: u64,
) -> (Vec<u64>, u64) {
    let theta = theta_a.min(theta_b);
    let b_set: HashSet<u64> = b.iter().copied().filter(|&h| h < theta).collect();
    let entries: Vec<u64> = a
        .iter()
        .copied()
        .filter(|&h| h < theta && b_set.contains(&h))
        .collect();
    (entries, theta)
}

/// Accumulates a running intersection across any number of theta sketches.
pub struct Intersection {
    seed_hash: u16,
    state: Option<(Vec<u64>, u64)>,
    seen_any_empty: bool,
}

impl Intersection {
    /// Starts an intersection expecting inputs hashed under `seed`.
    pub fn new(seed: u64) -> Self {
        Intersection {
            seed_hash: crate::common::hash::seed_hash(seed),
            state: None,
            seen_any_empty: false,
        }
    }

    /// Folds in one more sketch's entries. Intersecting with a genuinely empty sketch
    /// (zero items ever seen, `theta == MAX_THETA`) makes the whole running intersection
    /// exactly empty from then on, regardless of any other input's `theta`.
    ///
    /// # Errors
    /// Returns [`SketchError::SeedMismatch`] if `sketch`'s seed hash differs.
    pub fn update(&mut self, sketch: &CompactThetaSketch) -> Result<()> {
        check_seed_hash(self.seed_hash, sketch.seed_hash())?;
        if sketch.is_empty() {
            self.seen_any_empty = true;
        }
        self.state = Some(match self.state.take() {
            None => {
                let theta = sketch.theta();
                let entries: Vec<u64> = sketch.entries().iter().copied().filter(|&h| h < theta).collect();
                (entries, theta)
            }
            Some((entries, theta)) => intersect_entries(&entries, theta, sketch.entries(), sketch.theta()),
        });
        Ok(())
    }

    /// Emits the accumulated intersection.
    ///
    /// # Errors
    /// Returns [`SketchError::NoInput`] if `update` was never called.
    pub fn get_result(&self, ordered: bool) -> Result<CompactThetaSketch> {
        if self.state.is_none() {
            return Err(SketchError::NoInput);
        }
        if self.seen_any_empty {
            return Ok(CompactThetaSketch::empty(self.seed_hash));
        }
        let (mut entries, theta) = self.state.clone().unwrap();
        if ordered {
            entries.sort_unstable();
        }
        Ok(CompactThetaSketch::from_entries(entries, theta, self.seed_hash, ordered))
    }
}

/// Computes `a - b`: the entries unique to `a`.
///
/// # Errors
/// Returns [`SketchError::SeedMismatch`] if `a` and `b` have different seed hashes.
pub fn a_not_b(a: &CompactThetaSketch, b: &CompactThetaSketch, ordered: bool) -> Result<CompactThetaSketch> {
    check_seed_hash(a.seed_hash(), b.seed_hash())?;
    let theta = a.theta().min(b.theta());
    let b_set: HashSet<u64> = b.entries().iter().copied().filter(|&h| h < theta).collect();
    let mut entries: Vec<u64> = a
        .entries()
        .iter()
        .copied()
        .filter(|&h| h < theta && !b_set.contains(&h))
        .collect();
    if ordered {
        entries.sort_unstable();
    }
    Ok(CompactThetaSketch::from_entries(entries, theta, a.seed_hash(), ordered))
}

/// A Jaccard similarity estimate with a 2-sigma confidence interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaccardBounds {
    /// Lower 2σ bound.
    pub lower_bound: f64,
    /// Point estimate.
    pub estimate: f64,
    /// Upper 2σ bound.
    pub upper_bound: f64,
}

fn two_sigma_bounds(entries_len: usize, theta: u64) -> (f64, f64, f64) {
    let est = if theta == MAX_THETA {
        entries_len as f64
    } else {
        entries_len as f64 / (theta as f64 / MAX_THETA as f64)
    };
    if theta == MAX_THETA {
        return (est, est, est);
    }
    let tf = theta as f64 / MAX_THETA as f64;
    let err = 2.0 * (est * (1.0 - tf) / tf).sqrt();
    ((est - err).max(entries_len as f64), est, est + err)
}

/// Estimates `|A ∩ B| / |A ∪ B|` with a 2σ confidence interval. Computed directly from
/// each sketch's entries rather than through [`Union`]/[`Intersection`], since a compact
/// sketch carries only a `seed_hash`, not the full seed those accumulators require.
///
/// # Errors
/// Returns [`SketchError::SeedMismatch`] if `a` and `b` have different seed hashes.
pub fn jaccard(a: &CompactThetaSketch, b: &CompactThetaSketch) -> Result<JaccardBounds> {
    check_seed_hash(a.seed_hash(), b.seed_hash())?;

    let (inter_entries, inter_theta) = intersect_entries(a.entries(), a.theta(), b.entries(), b.theta());
    let union_theta = a.theta().min(b.theta());
    let union_entries: HashSet<u64> = a
        .entries()
        .iter()
        .chain(b.entries())
        .copied()
        .filter(|&h| h < union_theta)
        .collect();

    let (u_lb, u_est, u_ub) = two_sigma_bounds(union_entries.len(), union_theta);
    if u_est == 0.0 {
        return Ok(JaccardBounds {
            lower_bound: 1.0,
            estimate: 1.0,
            upper_bound: 1.0,
        });
    }
    let (i_lb, i_est, i_ub) = two_sigma_bounds(inter_entries.len(), inter_theta);

    Ok(JaccardBounds {
        lower_bound: (i_lb / u_ub).clamp(0.0, 1.0),
        estimate: (i_est / u_est).clamp(0.0, 1.0),
        upper_bound: (i_ub / u_lb.max(1.0)).clamp(0.0, 1.0),
    })
}

/// `true` iff `a` and `b` have identical `theta`, entry count, seed hash, and entry
/// multiset.
pub fn exactly_equal(a: &CompactThetaSketch, b: &CompactThetaSketch) -> bool {
    a.exactly_equal(b)
}
