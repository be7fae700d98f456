//! Error taxonomy for the engine.
//!
//! The core always returns `anyhow::Result`, matching the surrounding
//! crate's convention, but every error site constructs a concrete
//! [`ChassisError`] variant first so callers (and tests) can match on kind
//! rather than parse messages alone.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = anyhow::Result<T>;

/// The four error kinds recognized by the engine.
#[derive(Debug)]
pub enum ChassisError {
    /// Dimension mismatch, zero/negative `M` or `beamWidth`, empty input,
    /// zero-vector normalization, similarity-function mismatch between
    /// build and search.
    InvalidArgument(String),
    /// Underlying file read/write failure during on-disk graph operations.
    Io(String),
    /// Header magic or size mismatch in an on-disk graph file.
    Corruption(String),
    /// Internal "entry absent" condition (e.g. a cache miss that must be
    /// reported rather than silently treated as empty). Not used for
    /// "search against an empty graph", which spec.md treats as a normal
    /// empty result, not an error.
    NotFound(String),
}

impl fmt::Display for ChassisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChassisError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ChassisError::Io(msg) => write!(f, "io error: {msg}"),
            ChassisError::Corruption(msg) => write!(f, "corrupt graph file: {msg}"),
            ChassisError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for ChassisError {}

impl From<std::io::Error> for ChassisError {
    fn from(e: std::io::Error) -> Self {
        ChassisError::Io(e.to_string())
    }
}

/// Shorthand for building an `Err(anyhow::Error)` from an invalid-argument condition.
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::ChassisError::InvalidArgument(format!($($arg)*))))
    };
}
pub(crate) use invalid_argument;

macro_rules! corruption {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::ChassisError::Corruption(format!($($arg)*))))
    };
}
pub(crate) use corruption;
