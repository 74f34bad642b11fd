//! Database and collection name grammar checks.
//!
//! These are the validators the driver runs before touching a logical
//! file; a failure makes the driver skip the file and keep going. They
//! mirror the server-side grammar closely enough to reject names that
//! could never be restored.

use thiserror::Error;

/// Why a database or collection name was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty.
    #[error("name is empty")]
    Empty,

    /// The name exceeds the permitted length.
    #[error("name is {length} bytes long, max is {max}")]
    TooLong {
        /// Actual byte length.
        length: usize,
        /// Permitted maximum.
        max: usize,
    },

    /// The name contains a character the grammar forbids.
    #[error("name contains forbidden character `{0}`")]
    ForbiddenCharacter(char),
}

const MAX_DB_NAME_LENGTH: usize = 63;
const FORBIDDEN_DB_CHARS: &[char] = &[
    '/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0',
];

/// Validate a database name.
pub fn validate_db_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_DB_NAME_LENGTH {
        return Err(NameError::TooLong {
            length: name.len(),
            max: MAX_DB_NAME_LENGTH,
        });
    }
    for ch in name.chars() {
        if FORBIDDEN_DB_CHARS.contains(&ch) {
            return Err(NameError::ForbiddenCharacter(ch));
        }
    }
    Ok(())
}

/// Validate a collection name. Dots are legal (`system.indexes`); `$` and
/// NUL are not.
pub fn validate_collection_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    for ch in name.chars() {
        if ch == '$' || ch == '\0' {
            return Err(NameError::ForbiddenCharacter(ch));
        }
    }
    Ok(())
}
