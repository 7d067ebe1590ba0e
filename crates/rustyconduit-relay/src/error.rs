//! Errors raised by the HDF5 transcoder.

use rustyconduit_format::FormatError;

/// Every failure carries enough context to find the object without HDF5
/// internals: the store-relative path and, where known, the file name.
/// That context is attached once, where the logical path is known.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node tree cannot be written over what is already stored.
    #[error("incompatible tree: {0}")]
    IncompatibleTree(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("{file}:{path}: no such object")]
    NotFound { file: String, path: String },

    #[error("{file}:{path}: expected a {expected}, found a {found}")]
    WrongKind {
        file: String,
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("usage: {0}")]
    Usage(String),

    /// A dataset handle outlived the dataset it named.
    #[error("stale handle for {0}")]
    StaleHandle(String),

    #[error("I/O error on {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: HDF5 format error: {source}")]
    Format {
        file: String,
        #[source]
        source: FormatError,
    },

    #[error(transparent)]
    Node(#[from] rustyconduit::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
