//! Frequency estimation algorithms

pub mod frequent;
mod reverse_purge_map;

pub use frequent::{ErrorType, FrequentItemRow, FrequentItems};
