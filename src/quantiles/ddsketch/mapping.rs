//! Index mappings: the `value <-> index` authority for a DDSketch's bin stores.
//!
//! Four variants share one contract (see [`IndexMapping`]) but differ in how they
//! approximate `log_gamma(value)` inside a single exponent band: [`IndexMapping::Log`]
//! uses the exact natural logarithm, the others trade a little accuracy for speed by
//! interpolating the mantissa with a polynomial of increasing degree.

use crate::common::validation::validate_probability;
use crate::common::{Result, SketchError};

/// `fast_log2(x) = floor(log2(x)) + (mantissa(x) - 1.0)`, reconstructed by reinterpreting
/// the IEEE-754 bit pattern of `x` rather than calling `log2` directly.
///
/// Bit-stable with its inverse: `fast_log2_inverse(fast_log2(x)) == x` for every positive
/// finite `x`.
pub fn fast_log2(x: f64) -> f64 {
    let bits = x.to_bits() as i64;
    let exponent = ((bits & 0x7FF0000000000000_i64) >> 52) - 1023;
    let mantissa_plus_one_bits = (bits & 0x000F_FFFF_FFFF_FFFF_i64) | 0x3FF0000000000000_i64;
    let mantissa_plus_one = f64::from_bits(mantissa_plus_one_bits as u64);
    exponent as f64 + mantissa_plus_one - 1.0
}

/// Exact inverse of [`fast_log2`].
pub fn fast_log2_inverse(y: f64) -> f64 {
    let exponent = y.floor() as i64;
    let mantissa_plus_one = y - exponent as f64 + 1.0;
    let mut result_bits = ((exponent + 1023) as u64) << 52 & 0x7FF0000000000000_u64;
    let mantissa_plus_one_bits = mantissa_plus_one.to_bits();
    result_bits |= mantissa_plus_one_bits & 0x000F_FFFF_FFFF_FFFF_u64;
    f64::from_bits(result_bits)
}

fn quadratic_log(value: f64) -> f64 {
    const ONE_THIRD: f64 = 1.0 / 3.0;
    let bits = value.to_bits() as i64;
    let mantissa_plus_one_bits = (bits & 0x000F_FFFF_FFFF_FFFF_i64) | 0x3FF0000000000000_i64;
    let mantissa_plus_one = f64::from_bits(mantissa_plus_one_bits as u64);
    let exponent = ((bits & 0x7FF0000000000000_i64) >> 52) - 1023;
    exponent as f64 - (mantissa_plus_one - 5.0) * (mantissa_plus_one - 1.0) * ONE_THIRD
}

fn quadratic_log_inverse(index: f64) -> f64 {
    let exponent = index.floor() as i64;
    let mantissa_plus_one = 3.0 - (4.0 - 3.0 * (index - exponent as f64)).sqrt();
    let mut result_bits = ((exponent + 1023) as u64) << 52 & 0x7FF0000000000000_u64;
    result_bits |= mantissa_plus_one.to_bits() & 0x000F_FFFF_FFFF_FFFF_u64;
    f64::from_bits(result_bits)
}

const QUARTIC_A: f64 = -2.0 / 25.0;
const QUARTIC_B: f64 = 8.0 / 25.0;
const QUARTIC_C: f64 = -17.0 / 25.0;
const QUARTIC_D: f64 = 36.0 / 25.0;

fn quartic_log(value: f64) -> f64 {
    let bits = value.to_bits() as i64;
    let mantissa_plus_one_bits = (bits & 0x000F_FFFF_FFFF_FFFF_i64) | 0x3FF0000000000000_i64;
    let mantissa_plus_one = f64::from_bits(mantissa_plus_one_bits as u64);
    let mantissa = mantissa_plus_one - 1.0;
    let exponent = ((bits & 0x7FF0000000000000_i64) >> 52) - 1023;
    (((QUARTIC_A * mantissa + QUARTIC_B) * mantissa + QUARTIC_C) * mantissa + QUARTIC_D) * mantissa
        + exponent as f64
}

/// Derived via Ferrari's method for the quartic `log` above.
fn quartic_log_inverse(index: f64) -> f64 {
    let exponent = index.floor() as i64;
    let e = exponent as f64 - index;

    let (a, b, c, d) = (QUARTIC_A, QUARTIC_B, QUARTIC_C, QUARTIC_D);
    let alpha = -(3.0 * b * b) / (8.0 * a * a) + c / a;
    let beta = (b * b * b) / (8.0 * a * a * a) - (b * c) / (2.0 * a * a) + d / a;
    let gamma = -(3.0 * b * b * b * b) / (256.0 * a * a * a * a) + (c * b * b) / (16.0 * a * a * a)
        - (b * d) / (4.0 * a * a)
        + e / a;
    let p = -(alpha * alpha) / 12.0 - gamma;
    let q = -(alpha * alpha * alpha) / 108.0 + (alpha * gamma) / 3.0 - (beta * beta) / 8.0;
    let r = -q / 2.0 + ((q * q) / 4.0 + (p * p * p) / 27.0).sqrt();
    let u = r.cbrt();
    let y = -(5.0 * alpha) / 6.0 + u - p / (3.0 * u);
    let w = (alpha + 2.0 * y).sqrt();
    let x = (-b / (4.0 * a) + (w - (-(3.0 * alpha + 2.0 * y + (2.0 * beta) / w)).sqrt()) / 2.0) + 1.0;

    let mut result_bits = ((exponent + 1023) as u64) << 52 & 0x7FF0000000000000_u64;
    result_bits |= x.to_bits() & 0x000F_FFFF_FFFF_FFFF_u64;
    f64::from_bits(result_bits)
}

/// The four logarithm-like index mappings a DDSketch can be configured with.
///
/// Each maps a positive real value to an integer bin index such that adjacent indices
/// correspond to buckets of geometrically growing width, and the inverse reconstructs a
/// value within the mapping's relative accuracy `alpha` of the original input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexMapping {
    /// Exact natural-log mapping. Slowest, most accurate `log`.
    Log {
        /// Geometric ratio between adjacent bucket boundaries, `gamma > 1`.
        gamma: f64,
        /// Additive shift applied to the index before truncation.
        index_offset: f64,
    },
    /// Linear interpolation of `fast_log2` within each exponent band.
    LogLinear {
        /// Geometric ratio between adjacent bucket boundaries, `gamma > 1`.
        gamma: f64,
        /// Additive shift applied to the index before truncation.
        index_offset: f64,
    },
    /// Quadratic interpolation within each exponent band.
    LogQuadratic {
        /// Geometric ratio between adjacent bucket boundaries, `gamma > 1`.
        gamma: f64,
        /// Additive shift applied to the index before truncation.
        index_offset: f64,
    },
    /// Quartic interpolation within each exponent band, inverted via Ferrari's method.
    LogQuartic {
        /// Geometric ratio between adjacent bucket boundaries, `gamma > 1`.
        gamma: f64,
        /// Additive shift applied to the index before truncation.
        index_offset: f64,
    },
}

/// Discriminant written to the wire format's layout byte; mirrors the reference
/// implementation's `IndexMappingLayout` enum (its vestigial `LOG_CUBIC` member has no
/// constructor here and is never produced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexMappingLayout {
    /// [`IndexMapping::Log`]
    Log = 0,
    /// [`IndexMapping::LogLinear`]
    LogLinear = 1,
    /// [`IndexMapping::LogQuadratic`]
    LogQuadratic = 2,
    /// [`IndexMapping::LogQuartic`]
    LogQuartic = 4,
}

impl IndexMappingLayout {
    /// Decodes a layout byte read off the wire.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(IndexMappingLayout::Log),
            1 => Ok(IndexMappingLayout::LogLinear),
            2 => Ok(IndexMappingLayout::LogQuadratic),
            4 => Ok(IndexMappingLayout::LogQuartic),
            other => Err(SketchError::CorruptInput {
                reason: format!("unknown index mapping layout byte {}", other),
            }),
        }
    }
}

fn compute_gamma(relative_accuracy: f64, correcting_factor: f64) -> f64 {
    let exact_log_gamma = (1.0 + relative_accuracy) / (1.0 - relative_accuracy);
    exact_log_gamma.powf(1.0 / correcting_factor)
}

fn compute_relative_accuracy(gamma: f64, correcting_factor: f64) -> f64 {
    let exact_log_gamma = gamma.powf(correcting_factor);
    (exact_log_gamma - 1.0) / (exact_log_gamma + 1.0)
}

impl IndexMapping {
    const LOG_CORRECTING_FACTOR: f64 = 1.0;
    const LOG_LINEAR_CORRECTING_FACTOR: f64 = std::f64::consts::LOG2_E;
    const LOG_QUADRATIC_CORRECTING_FACTOR: f64 = 3.0 / (4.0 * std::f64::consts::LN_2);
    const LOG_QUARTIC_CORRECTING_FACTOR: f64 = 1.0 / (QUARTIC_D * std::f64::consts::LN_2);

    /// Builds the exact-logarithm mapping for a requested relative accuracy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn log(relative_accuracy: f64) -> Result<Self> {
        validate_probability(relative_accuracy, "relative_accuracy")?;
        let gamma = compute_gamma(relative_accuracy, Self::LOG_CORRECTING_FACTOR);
        Ok(IndexMapping::Log {
            gamma,
            index_offset: 0.0,
        })
    }

    /// Builds the linearly-interpolated mapping for a requested relative accuracy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn log_linear(relative_accuracy: f64) -> Result<Self> {
        validate_probability(relative_accuracy, "relative_accuracy")?;
        let gamma = compute_gamma(relative_accuracy, Self::LOG_LINEAR_CORRECTING_FACTOR);
        let index_offset = 1.0 / (1.0 + 2.0 * relative_accuracy / (1.0 - relative_accuracy)).ln();
        Ok(IndexMapping::LogLinear { gamma, index_offset })
    }

    /// Builds the quadratically-interpolated mapping for a requested relative accuracy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn log_quadratic(relative_accuracy: f64) -> Result<Self> {
        validate_probability(relative_accuracy, "relative_accuracy")?;
        let gamma = compute_gamma(relative_accuracy, Self::LOG_QUADRATIC_CORRECTING_FACTOR);
        Ok(IndexMapping::LogQuadratic {
            gamma,
            index_offset: 0.0,
        })
    }

    /// Builds the quartically-interpolated mapping for a requested relative accuracy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn log_quartic(relative_accuracy: f64) -> Result<Self> {
        validate_probability(relative_accuracy, "relative_accuracy")?;
        let gamma = compute_gamma(relative_accuracy, Self::LOG_QUARTIC_CORRECTING_FACTOR);
        Ok(IndexMapping::LogQuartic {
            gamma,
            index_offset: 0.0,
        })
    }

    fn gamma(&self) -> f64 {
        match *self {
            IndexMapping::Log { gamma, .. }
            | IndexMapping::LogLinear { gamma, .. }
            | IndexMapping::LogQuadratic { gamma, .. }
            | IndexMapping::LogQuartic { gamma, .. } => gamma,
        }
    }

    fn index_offset(&self) -> f64 {
        match *self {
            IndexMapping::Log { index_offset, .. }
            | IndexMapping::LogLinear { index_offset, .. }
            | IndexMapping::LogQuadratic { index_offset, .. }
            | IndexMapping::LogQuartic { index_offset, .. } => index_offset,
        }
    }

    fn base(&self) -> f64 {
        match self {
            IndexMapping::Log { .. } => std::f64::consts::E,
            _ => 2.0,
        }
    }

    fn correcting_factor(&self) -> f64 {
        match self {
            IndexMapping::Log { .. } => Self::LOG_CORRECTING_FACTOR,
            IndexMapping::LogLinear { .. } => Self::LOG_LINEAR_CORRECTING_FACTOR,
            IndexMapping::LogQuadratic { .. } => Self::LOG_QUADRATIC_CORRECTING_FACTOR,
            IndexMapping::LogQuartic { .. } => Self::LOG_QUARTIC_CORRECTING_FACTOR,
        }
    }

    fn multiplier(&self) -> f64 {
        self.base().ln() / (self.gamma() - 1.0).ln_1p()
    }

    fn log_variant(&self, value: f64) -> f64 {
        match self {
            IndexMapping::Log { .. } => value.ln(),
            IndexMapping::LogLinear { .. } => fast_log2(value),
            IndexMapping::LogQuadratic { .. } => quadratic_log(value),
            IndexMapping::LogQuartic { .. } => quartic_log(value),
        }
    }

    fn log_variant_inverse(&self, index: f64) -> f64 {
        match self {
            IndexMapping::Log { .. } => index.exp(),
            IndexMapping::LogLinear { .. } => fast_log2_inverse(index),
            IndexMapping::LogQuadratic { .. } => quadratic_log_inverse(index),
            IndexMapping::LogQuartic { .. } => quartic_log_inverse(index),
        }
    }

    /// The relative accuracy `alpha` this mapping was constructed to guarantee.
    pub fn relative_accuracy(&self) -> f64 {
        compute_relative_accuracy(self.gamma(), self.correcting_factor())
    }

    /// The geometric ratio between adjacent bucket boundaries.
    pub fn gamma_value(&self) -> f64 {
        self.gamma()
    }

    /// The discriminant written to the wire format.
    pub fn layout(&self) -> IndexMappingLayout {
        match self {
            IndexMapping::Log { .. } => IndexMappingLayout::Log,
            IndexMapping::LogLinear { .. } => IndexMappingLayout::LogLinear,
            IndexMapping::LogQuadratic { .. } => IndexMappingLayout::LogQuadratic,
            IndexMapping::LogQuartic { .. } => IndexMappingLayout::LogQuartic,
        }
    }

    /// Reconstructs a mapping from its wire-format fields.
    pub fn from_layout(layout: IndexMappingLayout, gamma: f64, index_offset: f64) -> Self {
        match layout {
            IndexMappingLayout::Log => IndexMapping::Log { gamma, index_offset },
            IndexMappingLayout::LogLinear => IndexMapping::LogLinear { gamma, index_offset },
            IndexMappingLayout::LogQuadratic => IndexMapping::LogQuadratic { gamma, index_offset },
            IndexMappingLayout::LogQuartic => IndexMapping::LogQuartic { gamma, index_offset },
        }
    }

    /// Maps a positive value to its bin index.
    ///
    /// # Panics
    /// Debug builds assert `value` is finite and positive; the caller (`DDSketch::update`)
    /// is responsible for routing non-positive values to `zero_count` first.
    pub fn index(&self, value: f64) -> i32 {
        debug_assert!(value.is_finite() && value > 0.0);
        let index = self.log_variant(value) * self.multiplier() + self.index_offset();
        index.floor() as i32
    }

    /// The inclusive lower bound of the bucket for `index`.
    pub fn lower_bound(&self, index: i32) -> f64 {
        self.log_variant_inverse((index as f64 - self.index_offset()) / self.multiplier())
    }

    /// The exclusive upper bound of the bucket for `index`, equal to `lower_bound(index+1)`.
    pub fn upper_bound(&self, index: i32) -> f64 {
        self.lower_bound(index + 1)
    }

    /// The representative value of a bucket: its lower bound scaled into the bucket's
    /// relative-accuracy midpoint.
    pub fn value(&self, index: i32) -> f64 {
        self.lower_bound(index) * (1.0 + self.relative_accuracy())
    }

    /// The smallest positive value this mapping can index without integer-index
    /// underflow or double underflow.
    pub fn min_indexable_value(&self) -> f64 {
        let a = self
            .base()
            .powf((i32::MIN as f64 - self.index_offset()) / self.multiplier() + 1.0);
        let b = f64::MIN_POSITIVE * (1.0 + self.relative_accuracy()) / (1.0 - self.relative_accuracy());
        a.max(b)
    }

    /// The largest value this mapping can index without integer-index overflow or double
    /// overflow.
    pub fn max_indexable_value(&self) -> f64 {
        let a = self
            .base()
            .powf((i32::MAX as f64 - self.index_offset()) / self.multiplier() - 1.0);
        let b = f64::MAX / (1.0 + self.relative_accuracy());
        a.min(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_log2_inverse_is_exact_inverse() {
        for x in [1.0, 2.0, 3.5, 100.0, 0.001, 1e10, 1e-10] {
            let y = fast_log2(x);
            let back = fast_log2_inverse(y);
            assert!(
                (back - x).abs() / x < 1e-9,
                "fast_log2 round-trip failed for {x}: got {back}"
            );
        }
    }

    #[test]
    fn test_log_mapping_accuracy() {
        let mapping = IndexMapping::log(0.01).unwrap();
        for v in [1.0, 10.0, 100.0, 1000.0, 0.5, 12345.678] {
            let idx = mapping.index(v);
            let approx = mapping.value(idx);
            let rel_err = (approx - v).abs() / v;
            assert!(rel_err <= 0.01 + 1e-9, "v={v} approx={approx} err={rel_err}");
        }
    }

    #[test]
    fn test_log_linear_mapping_accuracy() {
        let mapping = IndexMapping::log_linear(0.02).unwrap();
        for v in [1.0, 10.0, 100.0, 1000.0, 0.5, 98765.4] {
            let idx = mapping.index(v);
            let approx = mapping.value(idx);
            let rel_err = (approx - v).abs() / v;
            assert!(rel_err <= 0.02 + 1e-9, "v={v} approx={approx} err={rel_err}");
        }
    }

    #[test]
    fn test_log_quadratic_mapping_accuracy() {
        let mapping = IndexMapping::log_quadratic(0.01).unwrap();
        for v in [1.0, 10.0, 100.0, 1000.0, 0.5, 54321.0] {
            let idx = mapping.index(v);
            let approx = mapping.value(idx);
            let rel_err = (approx - v).abs() / v;
            assert!(rel_err <= 0.01 + 1e-9, "v={v} approx={approx} err={rel_err}");
        }
    }

    #[test]
    fn test_log_quartic_mapping_accuracy() {
        let mapping = IndexMapping::log_quartic(0.01).unwrap();
        for v in [1.0, 10.0, 100.0, 1000.0, 0.5, 24680.0] {
            let idx = mapping.index(v);
            let approx = mapping.value(idx);
            let rel_err = (approx - v).abs() / v;
            assert!(rel_err <= 0.01 + 1e-9, "v={v} approx={approx} err={rel_err}");
        }
    }

    #[test]
    fn test_bounds_ordering() {
        let mapping = IndexMapping::log(0.01).unwrap();
        let idx = mapping.index(42.0);
        assert!(mapping.lower_bound(idx) <= 42.0);
        assert!(mapping.upper_bound(idx) >= 42.0);
        assert!((mapping.upper_bound(idx) - mapping.lower_bound(idx + 1)).abs() < 1e-10);
    }

    #[test]
    fn test_invalid_relative_accuracy() {
        assert!(IndexMapping::log(0.0).is_err());
        assert!(IndexMapping::log(1.0).is_err());
        assert!(IndexMapping::log(-0.1).is_err());
    }
}
