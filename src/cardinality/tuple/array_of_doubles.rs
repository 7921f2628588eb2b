//! Array-of-doubles tuple sketch: the summary attached to each hash is a fixed-length
//! `Vec<f64>`, updated and unioned by element-wise addition. Useful for carrying one or
//! more running totals (counts, sums, weights) alongside a distinct-count estimate.

use super::{CompactTupleSketch, SummaryUnionPolicy, SummaryUpdatePolicy, TupleSketch};
use crate::common::serde::{write_f64, write_u16, write_u32, write_u64, Cursor};
use crate::common::{Result, SketchError};

const FAMILY_ID: u8 = 9;
const SKETCH_TYPE: u8 = 3;
const SERIAL_VERSION: u8 = 1;

/// Adds `update_value` into the existing per-slot totals, element-wise.
#[derive(Debug, Clone, Copy)]
pub struct ArrayOfDoublesPolicy {
    num_values: usize,
}

impl ArrayOfDoublesPolicy {
    /// Builds a policy for summaries of exactly `num_values` running totals.
    pub fn new(num_values: usize) -> Self {
        ArrayOfDoublesPolicy { num_values }
    }
}

impl SummaryUpdatePolicy<Vec<f64>> for ArrayOfDoublesPolicy {
    type UpdateValue = [f64];

    fn create_summary(&self) -> Vec<f64> {
        vec![0.0; self.num_values]
    }

    fn update_summary(&self, summary: &mut Vec<f64>, update_value: &[f64]) {
        for (slot, v) in summary.iter_mut().zip(update_value.iter()) {
            *slot += v;
        }
    }
}

impl SummaryUnionPolicy<Vec<f64>> for ArrayOfDoublesPolicy {
    fn combine(&self, left: &mut Vec<f64>, right: &Vec<f64>) {
        for (slot, v) in left.iter_mut().zip(right.iter()) {
            *slot += v;
        }
    }
}

/// A tuple sketch specialized to array-of-doubles summaries.
pub type ArrayOfDoublesSketch = TupleSketch<Vec<f64>, ArrayOfDoublesPolicy>;

/// Builds an array-of-doubles sketch with `k = 2^lg_k` nominal entries and `num_values`
/// running totals per slot.
///
/// # Errors
/// Returns [`SketchError::InvalidArgument`] if `lg_k` or `p` is out of range.
pub fn new_sketch(lg_k: u8, p: f32, seed: u64, num_values: usize) -> Result<ArrayOfDoublesSketch> {
    TupleSketch::new(lg_k, p, seed, ArrayOfDoublesPolicy::new(num_values))
}

/// Serializes a compacted array-of-doubles sketch to its wire format.
///
/// Layout: 1-byte preamble word count, 1-byte serial version, 1-byte family id, 1-byte
/// sketch type, 1-byte flags (bit0 = empty), 1-byte `num_values`, 2-byte seed hash, 8-byte
/// theta, 4-byte entry count, then each entry as an 8-byte hash followed by `num_values`
/// little-endian doubles.
pub fn serialize(sketch: &CompactTupleSketch<Vec<f64>>, num_values: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(2u8);
    buf.push(SERIAL_VERSION);
    buf.push(FAMILY_ID);
    buf.push(SKETCH_TYPE);
    let flags = if sketch.is_empty() { 1u8 } else { 0u8 };
    buf.push(flags);
    buf.push(num_values as u8);
    write_u16(&mut buf, sketch.seed_hash());
    write_u64(&mut buf, sketch.theta());
    write_u32(&mut buf, sketch.entries().len() as u32);
    for (hash, summary) in sketch.entries() {
        write_u64(&mut buf, *hash);
        for v in summary {
            write_f64(&mut buf, *v);
        }
    }
    buf
}

/// Deserializes an array-of-doubles sketch previously produced by [`serialize`].
///
/// # Errors
/// Returns [`SketchError::CorruptInput`] on truncated or malformed input, or
/// [`SketchError::IncompatibleSketch`] on a family id or sketch type mismatch.
pub fn deserialize(bytes: &[u8]) -> Result<CompactTupleSketch<Vec<f64>>> {
    let mut cursor = Cursor::new(bytes);
    let _preamble_words = cursor.read_u8()?;
    let _serial_version = cursor.read_u8()?;
    let family_id = cursor.read_u8()?;
    if family_id != FAMILY_ID {
        return Err(SketchError::IncompatibleSketch {
            reason: format!("expected family id {FAMILY_ID}, found {family_id}"),
        });
    }
    let sketch_type = cursor.read_u8()?;
    if sketch_type != SKETCH_TYPE {
        return Err(SketchError::IncompatibleSketch {
            reason: format!("expected sketch type {SKETCH_TYPE}, found {sketch_type}"),
        });
    }
    let flags = cursor.read_u8()?;
    let num_values = cursor.read_u8()? as usize;
    let seed_hash = cursor.read_u16()?;
    let theta = cursor.read_u64()?;
    let count = cursor.read_u32()? as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let hash = cursor.read_u64()?;
        let mut summary = Vec::with_capacity(num_values);
        for _ in 0..num_values {
            summary.push(cursor.read_f64()?);
        }
        entries.push((hash, summary));
    }
    Ok(CompactTupleSketch::from_parts(entries, theta, seed_hash, flags & 1 != 0))
}
