//! Integration tests for DDSketch (VLDB 2019).
//!
//! Tests cover basic functionality, relative-error guarantees, merge, and edge cases
//! from outside the crate, exercising only its public API.

use sketch_core::common::{Mergeable, Sketch};
use sketch_core::quantiles::DDSketch;

#[test]
fn test_new_ddsketch_accepts_valid_accuracy() {
    assert!(DDSketch::new(0.001).is_ok());
    assert!(DDSketch::new(0.01).is_ok());
    assert!(DDSketch::new(0.1).is_ok());
}

#[test]
fn test_new_ddsketch_rejects_invalid_accuracy() {
    assert!(DDSketch::new(0.0).is_err());
    assert!(DDSketch::new(-0.01).is_err());
    assert!(DDSketch::new(1.0).is_err());
}

#[test]
fn test_update_and_count() {
    let mut dd = DDSketch::new(0.01).unwrap();
    assert!(dd.get_is_empty());
    for i in 1..=1000 {
        dd.update(i as f64, 1.0).unwrap();
    }
    assert!(!dd.get_is_empty());
    assert_eq!(dd.get_count(), 1000.0);
}

#[test]
fn test_relative_accuracy_across_magnitudes() {
    let mut dd = DDSketch::new(0.01).unwrap();
    for i in 1..=100_000 {
        dd.update(i as f64, 1.0).unwrap();
    }
    for q in [0.1, 0.5, 0.9, 0.99] {
        let expected = q * 100_000.0;
        let got = dd.get_quantile(q).unwrap();
        assert!(
            (got - expected).abs() / expected < 0.02,
            "q={q} expected={expected} got={got}"
        );
    }
}

#[test]
fn test_negative_and_zero_values() {
    let mut dd = DDSketch::new(0.01).unwrap();
    for v in [-100.0, -10.0, 0.0, 10.0, 100.0] {
        dd.update(v, 1.0).unwrap();
    }
    assert_eq!(dd.get_count(), 5.0);
    assert_eq!(dd.get_min().unwrap(), -100.0);
    assert_eq!(dd.get_max().unwrap(), 100.0);
}

#[test]
fn test_merge_is_commutative_on_quantile_estimate() {
    let mut a = DDSketch::new(0.01).unwrap();
    let mut b = DDSketch::new(0.01).unwrap();
    for i in 1..=5000 {
        a.update(i as f64, 1.0).unwrap();
    }
    for i in 5001..=10_000 {
        b.update(i as f64, 1.0).unwrap();
    }
    let mut a_then_b = a.clone();
    Mergeable::merge(&mut a_then_b, &b).unwrap();
    let mut b_then_a = b.clone();
    Mergeable::merge(&mut b_then_a, &a).unwrap();
    assert_eq!(a_then_b.get_count(), b_then_a.get_count());
    let p50_ab = a_then_b.get_quantile(0.5).unwrap();
    let p50_ba = b_then_a.get_quantile(0.5).unwrap();
    assert!((p50_ab - p50_ba).abs() / p50_ab < 0.01);
}

#[test]
fn test_empty_sketch_queries_error() {
    let dd = DDSketch::new(0.01).unwrap();
    assert!(dd.get_quantile(0.5).is_err());
    assert!(dd.get_min().is_err());
    assert!(dd.get_max().is_err());
}

#[test]
fn test_serialize_round_trip() {
    let mut dd = DDSketch::new(0.02).unwrap();
    for i in 1..=2000 {
        dd.update(i as f64, 1.0).unwrap();
    }
    let bytes = Sketch::serialize(&dd);
    let restored = DDSketch::deserialize(&bytes).unwrap();
    assert_eq!(dd.get_count(), restored.get_count());
    assert_eq!(dd.get_quantile(0.5).unwrap(), restored.get_quantile(0.5).unwrap());
}
