use thiserror::Error;

/// Errors raised by the filter tree and its document format
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Failed to parse filter document: {0}")]
    DocumentParse(String),

    #[error("Failed to read filter document '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Index {index} is out of range for {len} children")]
    OutOfRange { index: usize, len: usize },

    #[error("Filter is not a combinator and cannot hold children")]
    NotACombinator,

    #[error("Cannot attach filter: {0}")]
    InvalidAttach(String),

    #[error("Filter node no longer exists")]
    StaleNode,

    #[error("Property '{property}' does not apply to this filter")]
    TypeMismatch { property: String },

    #[error("Failed to write filter document: {0}")]
    Serialize(String),
}
