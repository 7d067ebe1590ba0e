use std::fmt;

/// Errors raised while encoding or decoding a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No codec is registered for this filter id.
    UnknownFilter(u16),
    /// zlib stream could not be produced or consumed.
    Deflate(String),
    /// Data length is not a multiple of the element size.
    Misaligned { len: usize, element_size: usize },
    /// Stored Fletcher-32 checksum does not match the chunk contents.
    ChecksumMismatch { stored: u32, computed: u32 },
    /// A host codec reported a failure.
    Codec(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnknownFilter(id) => write!(f, "no codec registered for filter id {id}"),
            FilterError::Deflate(msg) => write!(f, "deflate: {msg}"),
            FilterError::Misaligned { len, element_size } => write!(
                f,
                "chunk of {len} bytes is not a multiple of element size {element_size}"
            ),
            FilterError::ChecksumMismatch { stored, computed } => write!(
                f,
                "fletcher32 mismatch: stored {stored:#010x}, computed {computed:#010x}"
            ),
            FilterError::Codec(msg) => write!(f, "codec: {msg}"),
        }
    }
}

impl std::error::Error for FilterError {}
