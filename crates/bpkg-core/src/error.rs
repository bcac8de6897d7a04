//! Error types for package name and version parsing.

use thiserror::Error;

/// Result alias used throughout `bpkg-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or validating core identity types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Package name is empty or contains characters outside
    /// `[A-Za-z0-9+.-]` after the leading letter.
    #[error("invalid package name '{0}'")]
    InvalidPackageName(String),

    /// Version string does not parse as `[epoch~]upstream[-revision][+iteration]`.
    #[error("invalid version '{0}': {1}")]
    InvalidVersion(String, String),

    /// Constraint string is malformed (e.g. empty interval, bad operator).
    #[error("invalid version constraint '{0}': {1}")]
    InvalidConstraint(String, String),

    /// A constraint's lower bound is greater than its upper bound.
    #[error("empty version constraint: {min} .. {max}")]
    EmptyInterval {
        /// Textual form of the lower bound.
        min: String,
        /// Textual form of the upper bound.
        max: String,
    },
}
