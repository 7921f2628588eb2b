//! Integration tests for the theta sketch and its set operations.

use sketch_core::cardinality::theta::setops::{a_not_b, jaccard, Intersection, Union};
use sketch_core::{ResizeFactor, ThetaSketch, ThetaSketchBuilder};

#[test]
fn test_new_and_update_estimate() {
    let mut sketch = ThetaSketch::new(12).unwrap();
    for i in 0..1000u64 {
        sketch.update_u64(i);
    }
    assert!((sketch.estimate() - 1000.0).abs() / 1000.0 < 0.1);
}

#[test]
fn test_builder_customizes_seed_and_resize_factor() {
    let sketch = ThetaSketchBuilder::new()
        .set_lg_k(10)
        .set_seed(42)
        .set_resize_factor(ResizeFactor::X4)
        .build()
        .unwrap();
    assert_eq!(sketch.seed(), 42);
    assert!(sketch.is_empty());
}

#[test]
fn test_union_of_disjoint_sets() {
    let mut a = ThetaSketch::new(12).unwrap();
    let mut b = ThetaSketch::new(12).unwrap();
    for i in 0..500u64 {
        a.update_u64(i);
    }
    for i in 500..1000u64 {
        b.update_u64(i);
    }
    let mut union = Union::new(12, a.seed()).unwrap();
    union.update(&a).unwrap();
    union.update(&b).unwrap();
    let result = union.get_result(false);
    assert!((result.estimate() - 1000.0).abs() / 1000.0 < 0.1);
}

#[test]
fn test_intersection_with_one_empty_input_is_exactly_empty() {
    let empty = ThetaSketch::new(12).unwrap();
    let mut nonempty = ThetaSketch::new(12).unwrap();
    for i in 0..1000u64 {
        nonempty.update_u64(i);
    }
    let mut inter = Intersection::new(empty.seed());
    inter.update(&nonempty.compact(false)).unwrap();
    inter.update(&empty.compact(false)).unwrap();
    let result = inter.get_result(false).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.estimate(), 0.0);
}

#[test]
fn test_a_not_b_is_set_difference() {
    let mut a = ThetaSketch::new(12).unwrap();
    let mut b = ThetaSketch::new(12).unwrap();
    for i in 0..1000u64 {
        a.update_u64(i);
    }
    for i in 500..1000u64 {
        b.update_u64(i);
    }
    let result = a_not_b(&a.compact(false), &b.compact(false), false).unwrap();
    assert!((result.estimate() - 500.0).abs() / 500.0 < 0.15);
}

#[test]
fn test_jaccard_of_identical_sketches_is_one() {
    let mut a = ThetaSketch::new(12).unwrap();
    for i in 0..1000u64 {
        a.update_u64(i);
    }
    let compact = a.compact(false);
    let bounds = jaccard(&compact, &compact).unwrap();
    assert!((bounds.estimate - 1.0).abs() < 0.05);
    assert!(bounds.lower_bound <= bounds.estimate);
    assert!(bounds.estimate <= bounds.upper_bound);
}

#[test]
fn test_seed_mismatch_is_rejected() {
    let mut a = ThetaSketch::builder().set_lg_k(10).set_seed(1).build().unwrap();
    let mut b = ThetaSketch::builder().set_lg_k(10).set_seed(2).build().unwrap();
    a.update_u64(1);
    b.update_u64(1);
    let mut union = Union::new(10, 1).unwrap();
    assert!(union.update(&b).is_err());
    union.update(&a).unwrap();
}

#[test]
fn test_serialize_round_trip_update_and_compact_forms() {
    let mut sketch = ThetaSketch::new(12).unwrap();
    for i in 0..2000u64 {
        sketch.update_u64(i);
    }
    let update_bytes = sketch.serialize();
    let restored = ThetaSketch::deserialize(&update_bytes).unwrap();
    assert_eq!(restored.num_entries(), sketch.num_entries());

    let compact = sketch.compact(true);
    let compact_bytes = compact.serialize();
    let restored_compact = sketch_core::CompactThetaSketch::deserialize(&compact_bytes).unwrap();
    assert!(restored_compact.exactly_equal(&compact));
}
