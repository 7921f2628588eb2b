//! Shared compaction arithmetic for the KLL and Quantiles-classic sketches.
//!
//! Both sketches grow a stack of levels with exponentially shrinking occupancy targets;
//! this module holds the formulas and randomized-selection primitives common to both,
//! mirroring the reference implementation's own shared helper header.

use rand::Rng;

/// Minimum width every compactor level is allowed to shrink to.
pub const MIN_LEVEL_WIDTH: u8 = 8;

const POWERS_OF_THREE: [u64; 31] = [
    1,
    3,
    9,
    27,
    81,
    243,
    729,
    2187,
    6561,
    19683,
    59049,
    177_147,
    531_441,
    1_594_323,
    4_782_969,
    14_348_907,
    43_046_721,
    129_140_163,
    387_420_489,
    1_162_261_467,
    3_486_784_401,
    10_460_353_203,
    31_381_059_609,
    94_143_178_827,
    282_429_536_481,
    847_288_609_443,
    2_541_865_828_329,
    7_625_597_484_987,
    22_876_792_454_961,
    68_630_377_364_883,
    205_891_132_094_649,
];

fn int_cap_aux_aux(k: u32, depth: u8) -> u32 {
    debug_assert!(depth <= 30);
    let twok = (k as u64) << 1;
    let tmp = (twok << depth) / POWERS_OF_THREE[depth as usize];
    let result = (tmp + 1) >> 1;
    debug_assert!(result <= k as u64);
    result as u32
}

fn int_cap_aux(k: u16, depth: u8) -> u32 {
    debug_assert!(depth <= 60);
    if depth <= 30 {
        return int_cap_aux_aux(k as u32, depth);
    }
    let half = depth / 2;
    let rest = depth - half;
    let tmp = int_cap_aux_aux(k as u32, half);
    int_cap_aux_aux(tmp, rest)
}

/// The target occupancy of the compactor at `height` out of `num_levels`, never below
/// `min_width`.
pub fn level_capacity(k: u16, num_levels: u8, height: u8, min_width: u8) -> u32 {
    assert!(height < num_levels, "height must be < num_levels");
    let depth = num_levels - height - 1;
    (min_width as u32).max(int_cap_aux(k, depth))
}

/// Sum of `level_capacity` across every level, the sketch's total retained-item budget.
pub fn compute_total_capacity(k: u16, m: u8, num_levels: u8) -> u32 {
    (0..num_levels).map(|h| level_capacity(k, num_levels, h, m)).sum()
}

/// Keeps every other element of an already-sorted, even-length slice, starting from a
/// single RNG-sourced bit. Preserves sort order.
pub fn randomly_halve<R: Rng + ?Sized>(items: &[f64], rng: &mut R) -> Vec<f64> {
    debug_assert_eq!(items.len() % 2, 0, "length must be even");
    let offset: usize = rng.random_range(0..2);
    items.iter().skip(offset).step_by(2).copied().collect()
}

/// Merges two already-sorted slices into one sorted `Vec`.
pub fn merge_sorted_arrays(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            result.push(a[i]);
            i += 1;
        } else {
            result.push(b[j]);
            j += 1;
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Normalized rank error for a single-sketch rank query (`as_pmf = false`) or a PMF/CDF
/// bucket query (`as_pmf = true`), as a function of `k`.
pub fn normalized_rank_error(k: u16, as_pmf: bool) -> f64 {
    if as_pmf {
        2.446 / (k as f64).powf(0.9433)
    } else {
        2.296 / (k as f64).powf(0.9723)
    }
}
