use thiserror::Error;

/// Errors raised by the value model and the text generators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed document text. `line` and `column` are 1-based, `offset`
    /// is a 0-based byte offset into the text.
    #[error("parse error at line {line}, column {column} (byte {offset}): {message}")]
    Parse {
        line: usize,
        column: usize,
        offset: usize,
        message: String,
    },

    #[error("invalid dtype name {0:?}")]
    InvalidTypeName(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("duplicate key {key:?} at {path:?}")]
    DuplicateKey { key: String, path: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("path {0:?} does not exist")]
    NotFound(String),

    /// Accessor used on a node of the wrong role.
    #[error("{0}")]
    Access(String),

    /// A data type that does not fit the buffer it is bound to.
    #[error("layout error: {0}")]
    Layout(String),

    #[error("usage error: {0}")]
    Usage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Join `path` and `name` the way error messages print node paths.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}/{name}")
    }
}
