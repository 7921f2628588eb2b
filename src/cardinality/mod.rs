//! Cardinality and set-membership sketches
//!
//! Theta sketches estimate the number of distinct items in a stream and support
//! set operations (union, intersection, A-not-B) across independently built sketches.
//! Tuple sketches generalize the same table to carry a per-item summary alongside
//! the distinct-count estimate.

pub mod theta;
pub mod tuple;

pub use theta::{CompactThetaSketch, ResizeFactor, ThetaSketch, ThetaSketchBuilder};
pub use tuple::{CompactTupleSketch, SummaryUnionPolicy, SummaryUpdatePolicy, TupleSketch};
