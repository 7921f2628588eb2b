//! Error types for sketch operations

use std::fmt;

/// Errors that can occur during sketch operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// Invalid parameter provided to sketch constructor or operation
    InvalidArgument {
        /// Parameter name
        param: String,
        /// Invalid value provided
        value: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// A DDSketch update value fell outside the mapping's indexable range
    OutOfRange {
        /// The offending value, formatted for display
        value: String,
        /// The violated bound, formatted for display
        bound: String,
    },

    /// Attempted to merge two DDSketches with non-equal index mappings
    IncompatibleMapping,

    /// Attempted to merge or combine sketches that are not structurally compatible
    IncompatibleSketch {
        /// Reason for incompatibility
        reason: String,
    },

    /// A query was made on an empty sketch for which no meaningful answer exists
    Empty {
        /// The operation that was attempted
        operation: String,
    },

    /// A deserialization invariant was violated
    CorruptInput {
        /// The violated check, named for diagnosis
        reason: String,
    },

    /// A theta/tuple operation saw an input whose seed hash did not match the operator's
    SeedMismatch {
        /// The seed hash this operator expects
        expected: u16,
        /// The seed hash found on the offending input
        found: u16,
    },

    /// A set operation requiring at least one input received none
    NoInput,
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::InvalidArgument {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid argument '{}': value '{}' {}",
                    param, value, constraint
                )
            }
            SketchError::OutOfRange { value, bound } => {
                write!(f, "value {} is out of range: {}", value, bound)
            }
            SketchError::IncompatibleMapping => {
                write!(f, "cannot merge DDSketches with non-equal index mappings")
            }
            SketchError::IncompatibleSketch { reason } => {
                write!(f, "incompatible sketches: {}", reason)
            }
            SketchError::Empty { operation } => {
                write!(f, "cannot perform '{}' on an empty sketch", operation)
            }
            SketchError::CorruptInput { reason } => {
                write!(f, "corrupt input: {}", reason)
            }
            SketchError::SeedMismatch { expected, found } => {
                write!(
                    f,
                    "seed hash mismatch: expected {:#06x}, found {:#06x}",
                    expected, found
                )
            }
            SketchError::NoInput => {
                write!(f, "set operation requires at least one input")
            }
        }
    }
}

impl std::error::Error for SketchError {}

/// Result type alias for sketch operations
pub type Result<T> = std::result::Result<T, SketchError>;
