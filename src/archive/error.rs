//! Chunked archive error types.

use std::io;
use thiserror::Error;

/// Errors raised by the chunked archive writer and reader.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writer operation after `close`.
    #[error("chunk writer is closed")]
    WriterClosed,

    /// The background flush task failed; the error is latched and the
    /// archive must be considered truncated.
    #[error("background chunk write failed: {0}")]
    Background(String),

    /// A chunk of the current logical file arrived out of sequence.
    #[error("chunks out of order for `{name}`: expected {expected}, got {actual}")]
    ChunkOutOfOrder {
        /// Logical file whose chunks are misordered.
        name: String,
        /// The index the reader required next.
        expected: u64,
        /// The index actually present in the archive.
        actual: u64,
    },

    /// A new logical file started at a nonzero chunk index.
    #[error("missing first chunk for `{name}`: expected 0, got {actual}")]
    MissingFirstChunk {
        /// Logical file missing its first chunk.
        name: String,
        /// The index actually present in the archive.
        actual: u64,
    },

    /// A tar header or entry body could not be parsed.
    #[error("malformed tar entry: {0}")]
    MalformedEntry(String),

    /// IO error from the underlying source or sink.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Create a malformed-entry error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEntry(msg.into())
    }
}

impl From<ArchiveError> for io::Error {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(io_err) => io_err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type for chunked archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
