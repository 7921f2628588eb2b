//! Integration tests for the tuple sketch and its array-of-doubles instantiation.

use sketch_core::cardinality::tuple::array_of_doubles::{self, ArrayOfDoublesPolicy};
use sketch_core::cardinality::{SummaryUnionPolicy, SummaryUpdatePolicy, TupleSketch};

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
fn test_update_creates_and_accumulates_summary() {
    let mut sketch = TupleSketch::new(10, 1.0, 1, SumPolicy).unwrap();
    sketch.update(b"a", &1.0);
    sketch.update(b"a", &2.0);
    sketch.update(b"b", &5.0);
    assert_eq!(sketch.num_entries(), 2);
    let total: f64 = sketch.entries().map(|(_, s)| *s).sum();
    assert_eq!(total, 8.0);
}

#[test]
fn test_compact_union_combines_summaries_on_shared_hashes() {
    let mut a = TupleSketch::new(10, 1.0, 7, SumPolicy).unwrap();
    let mut b = TupleSketch::new(10, 1.0, 7, SumPolicy).unwrap();
    a.update(b"x", &3.0);
    b.update(b"x", &4.0);
    b.update(b"y", &1.0);
    let union = a.compact().union(&b.compact(), &SumPolicy).unwrap();
    assert_eq!(union.entries().len(), 2);
    let total: f64 = union.entries().iter().map(|(_, s)| *s).sum();
    assert_eq!(total, 8.0);
}

#[test]
fn test_union_rejects_seed_mismatch() {
    let a = TupleSketch::new(10, 1.0, 1, SumPolicy).unwrap();
    let b = TupleSketch::new(10, 1.0, 2, SumPolicy).unwrap();
    assert!(a.compact().union(&b.compact(), &SumPolicy).is_err());
}

#[test]
fn test_array_of_doubles_update_and_estimate() {
    let mut sketch = array_of_doubles::new_sketch(10, 1.0, 5, 2).unwrap();
    for i in 0..200u64 {
        sketch.update(&i.to_le_bytes(), &[1.0, i as f64]);
    }
    let compact = sketch.compact();
    assert!((compact.estimate() - 200.0).abs() / 200.0 < 0.2);
}

#[test]
fn test_array_of_doubles_union_adds_overlapping_totals() {
    let mut a = array_of_doubles::new_sketch(10, 1.0, 5, 1).unwrap();
    let mut b = array_of_doubles::new_sketch(10, 1.0, 5, 1).unwrap();
    a.update(b"x", &[3.0]);
    b.update(b"x", &[4.0]);
    let policy = ArrayOfDoublesPolicy::new(1);
    let union = a.compact().union(&b.compact(), &policy).unwrap();
    assert_eq!(union.entries()[0].1[0], 7.0);
}

#[test]
fn test_array_of_doubles_serialize_round_trip() {
    let mut sketch = array_of_doubles::new_sketch(10, 1.0, 9, 2).unwrap();
    sketch.update(b"a", &[1.0, 2.0]);
    sketch.update(b"b", &[3.0, 4.0]);
    let compact = sketch.compact();
    let bytes = array_of_doubles::serialize(&compact, 2);
    let back = array_of_doubles::deserialize(&bytes).unwrap();
    assert_eq!(back.entries().len(), compact.entries().len());
    assert_eq!(back.theta(), compact.theta());
}
