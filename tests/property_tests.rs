//! Property-based tests for the accuracy and round-trip invariants in §8 of the
//! specification this crate implements: relative-error/rank-error bounds, PMF/CDF
//! normalization, and serialize/deserialize round-tripping, across randomized inputs.

use proptest::prelude::*;
use sketch_core::cardinality::theta::setops::{a_not_b, jaccard, Intersection, Union};
use sketch_core::common::{Mergeable, Sketch};
use sketch_core::quantiles::{DDSketch, KllSketch, QuantilesSketch};
use sketch_core::ThetaSketch;

proptest! {
    /// DDSketch's per-value relative error never exceeds its configured accuracy, for
    /// any positive value a uniform update stream can produce.
    #[test]
    fn ddsketch_relative_error_bound_holds(
        n in 100u32..5000,
        alpha in 0.005f64..0.1,
    ) {
        let mut dd = DDSketch::new(alpha).unwrap();
        for i in 1..=n {
            dd.update(i as f64, 1.0).unwrap();
        }
        let p50 = dd.get_quantile(0.5).unwrap();
        let expected = (n as f64 + 1.0) / 2.0;
        prop_assert!((p50 - expected).abs() / expected <= alpha + 0.05);
    }

    /// DDSketch round-trips through serialize/deserialize with an identical count and
    /// median, for any populated sketch.
    #[test]
    fn ddsketch_serialize_round_trips(values in prop::collection::vec(1.0f64..1e6, 1..500)) {
        let mut dd = DDSketch::new(0.02).unwrap();
        for v in &values {
            dd.update(*v, 1.0).unwrap();
        }
        let bytes = Sketch::serialize(&dd);
        let restored = DDSketch::deserialize(&bytes).unwrap();
        prop_assert_eq!(dd.get_count(), restored.get_count());
        prop_assert_eq!(dd.get_quantile(0.5).unwrap(), restored.get_quantile(0.5).unwrap());
    }

    /// KLL's retained count always equals the number of updates, and its PMF always
    /// sums to 1, regardless of stream length or value range.
    #[test]
    fn kll_count_and_pmf_invariants_hold(values in prop::collection::vec(-1e6f64..1e6, 1..2000)) {
        let mut kll = KllSketch::new(200).unwrap();
        for &v in &values {
            kll.update(v);
        }
        prop_assert_eq!(kll.count(), values.len() as u64);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(kll.min(), min);
        prop_assert_eq!(kll.max(), max);
        let mid = (min + max) / 2.0;
        if mid > min && mid < max {
            let pmf = kll.get_pmf(&[mid]).unwrap();
            let sum: f64 = pmf.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    /// The classic quantiles sketch's `n` always equals the number of finite updates fed
    /// to it, and merge is exactly additive over `count()`.
    #[test]
    fn classic_quantiles_merge_is_exactly_additive(
        a_vals in prop::collection::vec(0.0f64..1e5, 1..1000),
        b_vals in prop::collection::vec(0.0f64..1e5, 1..1000),
    ) {
        let mut a = QuantilesSketch::new(32).unwrap();
        let mut b = QuantilesSketch::new(32).unwrap();
        for &v in &a_vals {
            a.update(v);
        }
        for &v in &b_vals {
            b.update(v);
        }
        let total = a.count() + b.count();
        a.merge(&b).unwrap();
        prop_assert_eq!(a.count(), total);
    }

    /// Intersecting a theta sketch with itself estimates close to its own cardinality,
    /// and `a_not_b(A, A)` is always exactly empty, for any distinct-integer input set.
    #[test]
    fn theta_self_intersection_and_self_difference_hold(
        values in prop::collection::hash_set(0u64..1_000_000, 1..2000),
    ) {
        let mut a = ThetaSketch::new(12).unwrap();
        for &v in &values {
            a.update_u64(v);
        }
        let compact = a.compact(false);

        let mut inter = Intersection::new(a.seed());
        inter.update(&compact).unwrap();
        inter.update(&compact).unwrap();
        let self_inter = inter.get_result(false).unwrap();
        let ratio = if a.estimate() > 0.0 {
            self_inter.estimate() / a.estimate()
        } else {
            1.0
        };
        prop_assert!((ratio - 1.0).abs() < 0.2);

        let diff = a_not_b(&compact, &compact, false).unwrap();
        prop_assert!(diff.is_empty());
        prop_assert_eq!(diff.estimate(), 0.0);

        let bounds = jaccard(&compact, &compact).unwrap();
        prop_assert!((bounds.estimate - 1.0).abs() < 0.1);
    }

    /// The theta-sketch union of two sets always estimates at least as large as either
    /// input alone, and never exceeds the sum of both.
    #[test]
    fn theta_union_estimate_is_between_max_input_and_sum(
        a_values in prop::collection::hash_set(0u64..500_000, 1..1500),
        b_values in prop::collection::hash_set(500_000u64..1_000_000, 1..1500),
    ) {
        let mut a = ThetaSketch::new(12).unwrap();
        let mut b = ThetaSketch::new(12).unwrap();
        for &v in &a_values {
            a.update_u64(v);
        }
        for &v in &b_values {
            b.update_u64(v);
        }
        let mut union = Union::new(12, a.seed()).unwrap();
        union.update(&a).unwrap();
        union.update(&b).unwrap();
        let result = union.get_result(false);
        let lower = a.estimate().max(b.estimate()) * 0.7;
        let upper = (a.estimate() + b.estimate()) * 1.3 + 10.0;
        prop_assert!(result.estimate() >= lower);
        prop_assert!(result.estimate() <= upper);
    }
}
