//! Quantile estimation algorithms
//!
//! This module provides algorithms for estimating quantiles (percentiles) from
//! streaming data.
//!
//! # Algorithms
//!
//! - [`DDSketch`] - relative-error quantiles via a logarithmic index mapping (VLDB 2019)
//! - [`KllSketch`] - rank-error quantiles via a compactor stack (PODS 2021)
//! - [`QuantilesSketch`] - the classic base-buffer-plus-binary-carry quantiles sketch
//!
//! # Choosing an Algorithm
//!
//! ## DDSketch
//!
//! **Use when:**
//! - You need relative error guarantees (error proportional to value)
//! - Your data spans multiple orders of magnitude
//! - You need to merge sketches from distributed systems
//! - You're tracking latencies, request sizes, or financial metrics
//!
//! **Characteristics:**
//! - Relative accuracy (e.g., 1% error)
//! - Fast merge operations
//! - Space: O(log(max/min))
//!
//! ## KLL / Quantiles-classic
//!
//! **Use when:**
//! - You need rank (not relative-value) error guarantees
//! - You want the smallest possible sketch for a target rank accuracy
//!
//! **Characteristics:**
//! - Normalized rank error shrinks with `k`
//! - Space: O(k log(n/k))
//!
//! # Examples
//!
//! ## DDSketch Example
//!
//! ```
//! use sketch_core::quantiles::DDSketch;
//!
//! let mut dd = DDSketch::new(0.01).unwrap(); // 1% relative error
//!
//! // Add measurements
//! for i in 1..=1000 {
//!     dd.update(i as f64, 1.0).unwrap();
//! }
//!
//! // Query quantiles
//! println!("Median: {}", dd.get_quantile(0.5).unwrap());
//! println!("p99: {}", dd.get_quantile(0.99).unwrap());
//! ```
//!
//! ## KLL Example
//!
//! ```
//! use sketch_core::quantiles::KllSketch;
//!
//! let mut kll = KllSketch::new(200).unwrap();
//! for i in 1..=10_000 {
//!     kll.update(i as f64);
//! }
//! println!("Median: {}", kll.get_quantile(0.5).unwrap());
//! ```

pub mod classic;
pub mod ddsketch;
mod kll;
mod kll_helper;

pub use classic::QuantilesSketch;
pub use ddsketch::DDSketch;
pub use kll::{KllFloatSketch, KllSketch};
