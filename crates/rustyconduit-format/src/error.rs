//! Failures while decoding or encoding HDF5 structures.

use core::fmt;

use rustyconduit_filters::FilterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No superblock signature at offset 0 or any power of two after 512.
    SignatureNotFound,
    /// A structure carries a version this crate does not implement.
    UnsupportedVersion { what: &'static str, version: u8 },
    /// A read ran past the end of the buffer.
    UnexpectedEof { expected: usize, available: usize },
    /// A block did not start with its four-byte signature.
    BadSignature(&'static str),
    /// Stored lookup3 checksum versus the one computed over the block.
    ChecksumMismatch { expected: u32, computed: u32 },
    /// A message flagged "fail if unknown" that this crate does not know.
    UnsupportedMessage(u16),
    /// Valid HDF5 that lies outside the subset this crate handles.
    Unsupported(String),
    Invalid(String),
    Filter(FilterError),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SignatureNotFound => f.write_str("no HDF5 superblock signature found"),
            FormatError::UnsupportedVersion { what, version } => write!(f, "{what} version {version} is not supported"),
            FormatError::UnexpectedEof { expected, available } => {
                write!(f, "truncated data: wanted {expected} bytes, {available} left")
            }
            FormatError::BadSignature(sig) => write!(f, "missing {sig} signature"),
            FormatError::ChecksumMismatch { expected, computed } => {
                write!(f, "bad checksum: stored {expected:#010x}, computed {computed:#010x}")
            }
            FormatError::UnsupportedMessage(id) => write!(f, "required message {id:#06x} is not understood"),
            FormatError::Unsupported(what) => write!(f, "unsupported: {what}"),
            FormatError::Invalid(what) => write!(f, "invalid: {what}"),
            FormatError::Filter(e) => write!(f, "filter: {e}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormatError::Filter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FilterError> for FormatError {
    fn from(e: FilterError) -> Self {
        FormatError::Filter(e)
    }
}
