//! Error types for filter compilation.

use thiserror::Error;

/// A filter string that could not be compiled into a predicate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterSyntaxError {
    /// No operator from the fixed set could be matched, or the field/value
    /// around it is malformed.
    #[error("could not match filter: {0}")]
    Malformed(String),

    /// A `timestamp` filter whose value cannot be read as an instant.
    #[error("invalid timestamp value: {0}")]
    InvalidTimestamp(String),
}
