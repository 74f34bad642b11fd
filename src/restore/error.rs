//! Restore driver error types.

use std::io;
use thiserror::Error;

use crate::archive::ArchiveError;

/// Errors that abort a restore pass.
///
/// Skippable per-file conditions (unknown kinds, invalid names, late
/// metadata) never become errors; the driver logs them and moves on.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Structural or ordering failure in the archive itself.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// IO failure while streaming a logical file to the target.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A restore target callback failed.
    #[error("restore target error: {0}")]
    Target(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RestoreError {
    /// Wrap a target-side failure.
    pub fn target(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Target(err.into())
    }
}

/// Result type for restore operations.
pub type RestoreResult<T> = Result<T, RestoreError>;
