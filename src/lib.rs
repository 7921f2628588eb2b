//! sketch_core: probabilistic streaming sketches for approximate quantiles, frequent
//! items, and distinct-count / set operations.
//!
//! Every sketch trades exactness for bounded memory: each accepts a size parameter
//! (`k`, `lg_k`, or `lg_max_map_size`) that fixes its footprint up front and determines
//! its guaranteed error bound, and each can be merged with another sketch of the same
//! family to combine independently-collected streams without re-reading the source data.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cardinality;
pub mod common;
pub mod frequency;
pub mod quantiles;

pub use common::{hash, Mergeable, Result, Sketch, SketchError};

/// Error types and result aliases for sketch operations
pub mod error {
    pub use crate::common::{Result, SketchError};
}

// Re-export commonly used sketches
pub use cardinality::{CompactThetaSketch, ResizeFactor, ThetaSketch, ThetaSketchBuilder};
pub use frequency::{ErrorType, FrequentItemRow, FrequentItems};
pub use quantiles::{DDSketch, KllFloatSketch, KllSketch, QuantilesSketch};

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {}
}
