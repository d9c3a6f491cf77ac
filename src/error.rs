//! Error types for the DjVu library.
//!
//! This module defines all error types that can occur while opening, slicing
//! and re-encoding DjVu containers.

/// Result type alias for DjVu library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during DjVu processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read ran past the end of the current view
    #[error("Truncated input at byte {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        /// Absolute byte offset where the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
        /// Number of bytes left in the view
        available: usize,
    },

    /// Outer magic or top-level FORM header missing
    #[error("Unrecognized format: expected 'AT&TFORM', found '{0}'")]
    UnrecognizedFormat(String),

    /// Chunk framing is inconsistent
    #[error("Malformed container at byte {offset}: {reason}")]
    MalformedContainer {
        /// Absolute byte offset of the offending chunk
        offset: usize,
        /// Description of the problem
        reason: String,
    },

    /// DIRM chunk is inconsistent with its own counts
    #[error("Malformed directory: {0}")]
    MalformedDirectory(String),

    /// Requested page range does not fit the document
    #[error("Invalid page range {from}..{to} for a document with {page_count} pages")]
    InvalidRange {
        /// First page of the range (inclusive)
        from: usize,
        /// Last page of the range (exclusive)
        to: usize,
        /// Number of pages in the document
        page_count: usize,
    },

    /// Compressed stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Configured safety limit exceeded
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Bundle writer misuse or unrepresentable output
    #[error("Writer error: {0}")]
    Writer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
