//! Integration tests for the classic (non-KLL) ripple-carry quantiles sketch.

use sketch_core::common::{Mergeable, Sketch};
use sketch_core::quantiles::QuantilesSketch;

#[test]
fn test_new_rejects_small_k() {
    assert!(QuantilesSketch::new(4).is_err());
    assert!(QuantilesSketch::new(8).is_ok());
}

#[test]
fn test_update_ignores_non_finite_values() {
    let mut q = QuantilesSketch::new(128).unwrap();
    q.update(1.0);
    q.update(f64::NAN);
    q.update(f64::INFINITY);
    q.update(2.0);
    assert_eq!(q.count(), 2);
}

#[test]
fn test_quantile_accuracy_uniform_stream() {
    let mut q = QuantilesSketch::with_seed(128, 5).unwrap();
    for i in 0..20_000 {
        q.update(i as f64);
    }
    let bound = QuantilesSketch::normalized_rank_error(128) * 20_000.0;
    let p50 = q.get_quantile(0.5).unwrap();
    assert!((p50 - 10_000.0).abs() < bound * 3.0, "p50={p50}");
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
fn test_merge_across_compacted_levels_preserves_exact_count() {
    let mut a = QuantilesSketch::with_seed(8, 7).unwrap();
    let mut b = QuantilesSketch::with_seed(8, 9).unwrap();
    for i in 0..30_000 {
        a.update(i as f64);
    }
    for i in 30_000..60_000 {
        b.update(i as f64);
    }
    a.merge(&b).unwrap();
    assert_eq!(a.count(), 60_000);
    assert_eq!(a.min(), 0.0);
    assert_eq!(a.max(), 59_999.0);
}

#[test]
fn test_merge_rejects_mismatched_k() {
    let mut a = QuantilesSketch::new(128).unwrap();
    let b = QuantilesSketch::new(64).unwrap();
    assert!(a.merge(&b).is_err());
}

#[test]
fn test_pmf_sums_to_one() {
    let mut q = QuantilesSketch::with_seed(128, 1).unwrap();
    for i in 0..10_000 {
        q.update(i as f64);
    }
    let pmf = q.get_pmf(&[2500.0, 5000.0, 7500.0]).unwrap();
    let sum: f64 = pmf.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn test_serialize_round_trip() {
    let mut q = QuantilesSketch::with_seed(128, 13).unwrap();
    for i in 0..4000 {
        q.update(i as f64);
    }
    let bytes = Sketch::serialize(&q);
    let restored = QuantilesSketch::deserialize(&bytes).unwrap();
    assert_eq!(q.count(), restored.count());
    assert_eq!(q.k(), restored.k());
}
