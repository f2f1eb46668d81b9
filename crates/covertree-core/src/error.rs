//! Error types for covertree-core.

use thiserror::Error;

/// Errors surfaced by tree construction and the binary codec.
///
/// Not-found conditions (removing an absent point, looking up an unknown
/// identity) are reported through `bool`/`Option` return values, never
/// through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction parameter.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A metric name that does not resolve to a distance function.
    #[error("Unknown distance metric: {0}")]
    UnknownMetric(String),

    /// Malformed or truncated encoded stream.
    #[error("Codec error: {0}")]
    Codec(String),

    /// IO error from the underlying reader or writer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for covertree operations.
pub type Result<T> = std::result::Result<T, Error>;
