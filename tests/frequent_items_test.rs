//! Integration tests for the Frequent-items (weighted Misra-Gries) sketch.

use sketch_core::{ErrorType, FrequentItems, SketchError};

#[test]
fn test_new_rejects_tiny_map_size() {
    let result: Result<FrequentItems<String>, SketchError> = FrequentItems::new(1);
    assert!(result.is_err());
}

#[test]
fn test_update_and_exact_estimate_below_capacity() {
    let mut sketch = FrequentItems::new(10).unwrap();
    for _ in 0..5 {
        sketch.update("apple".to_string());
    }
    sketch.update("banana".to_string());
    assert_eq!(sketch.get_estimate(&"apple".to_string()), 5);
    assert_eq!(sketch.get_lower_bound(&"apple".to_string()), 5);
    assert_eq!(sketch.get_upper_bound(&"apple".to_string()), 5);
    assert_eq!(sketch.get_estimate(&"banana".to_string()), 1);
}

#[test]
fn test_update_by_weight() {
    let mut sketch = FrequentItems::new(10).unwrap();
    sketch.update_by("heavy".to_string(), 1000);
    assert_eq!(sketch.get_estimate(&"heavy".to_string()), 1000);
    assert_eq!(sketch.total_weight(), 1000);
}

#[test]
fn test_unseen_item_has_zero_estimate() {
    let sketch: FrequentItems<String> = FrequentItems::new(10).unwrap();
    assert_eq!(sketch.get_estimate(&"missing".to_string()), 0);
}

#[test]
fn test_heavy_hitter_survives_purge_under_pressure() {
    let lg_map_size = 4u8;
    let mut sketch = FrequentItems::new(lg_map_size).unwrap();
    sketch.update_by("heavy".to_string(), 100_000);
    for i in 0..50_000u64 {
        sketch.update(format!("noise-{i}"));
    }
    let items = sketch.get_frequent_items(ErrorType::NoFalseNegatives, None);
    assert!(items.iter().any(|row| row.item == "heavy"));
}

#[test]
fn test_merge_combines_weights() {
    let mut a = FrequentItems::new(10).unwrap();
    let mut b = FrequentItems::new(10).unwrap();
    a.update_by("shared".to_string(), 100);
    b.update_by("shared".to_string(), 50);
    b.update_by("only_b".to_string(), 20);
    a.merge(&b);
    assert_eq!(a.get_estimate(&"shared".to_string()), 150);
    assert!(a.get_estimate(&"only_b".to_string()) >= 20);
}

#[test]
fn test_is_empty() {
    let sketch: FrequentItems<String> = FrequentItems::new(10).unwrap();
    assert!(sketch.is_empty());
}
