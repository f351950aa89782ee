//! Error types for trie and snapshot operations.

use std::io;
use thiserror::Error;

/// Result type for trie operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by trie and snapshot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required transition does not exist for the requested key or path.
    #[error("no path for the requested key")]
    NoPath,

    /// The addressed node exists but carries no stored value (it is only a
    /// structural prefix of longer keys).
    #[error("no value stored at the requested node")]
    NoValue,

    /// The key is not representable: it contains the reserved byte 0, or the
    /// id handed to `key` does not name a live, reachable node.
    #[error("invalid key")]
    InvalidKey,

    /// The value is outside the storable range `0 ..= i32::MAX - 1`.
    #[error("invalid value")]
    InvalidValue,

    /// An unrecognized snapshot format token was requested.
    #[error("unsupported snapshot format {0:?}")]
    UnsupportedFormat(String),

    /// Snapshot serialization failed.
    #[error("snapshot encode failed: {0}")]
    Encode(String),

    /// Snapshot deserialization failed or the decoded snapshot is not
    /// internally consistent.
    #[error("snapshot decode failed: {0}")]
    Decode(String),

    /// I/O error from the underlying source or sink, passed through.
    #[error(transparent)]
    Io(#[from] io::Error),
}
