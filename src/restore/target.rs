//! The restore collaborator interface.
//!
//! Everything that actually touches a database (collection creation, BSON
//! decoding and insertion, index builds) lives behind [`RestoreTarget`].
//! The driver owns the pass over the archive and hands the target an
//! [`Intent`] per logical file plus the archive reader positioned at that
//! file's bytes.

use std::collections::HashMap;
use std::io::Read;

use crate::restore::error::RestoreResult;
use crate::restore::file_info::FileKind;
use crate::restore::metadata::IndexDocument;

/// Per-collection restore handle.
///
/// Plain data: the byte source is always passed alongside it, never stored
/// inside, so the handle carries no hidden reference to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// Target database.
    pub db: String,
    /// Target collection.
    pub collection: String,
    /// What the associated logical file contains.
    pub kind: FileKind,
}

impl Intent {
    /// The fully qualified `db.collection` namespace.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.db, self.collection)
    }
}

/// Database-side collaborator driven by the restore pass.
///
/// Methods that consume a logical file's bytes receive the archive reader
/// as `source`; they must read to the end of the logical file (the reader
/// stops at the file boundary on its own).
pub trait RestoreTarget {
    /// Build the intent for a logical file, or `None` to have the driver
    /// skip it.
    fn create_intent(&mut self, db: &str, collection: &str, kind: FileKind) -> Option<Intent>;

    /// Called once before the first data or metadata file of a non-system
    /// collection; returns whether the collection already exists on the
    /// target.
    fn begin_collection(&mut self, intent: &Intent) -> RestoreResult<bool>;

    /// Apply a collection's metadata document, returning its ordered index
    /// definitions for the driver to build once the collection's data is
    /// complete.
    fn restore_metadata(
        &mut self,
        intent: &Intent,
        collection_exists: bool,
        source: &mut dyn Read,
    ) -> RestoreResult<Vec<IndexDocument>>;

    /// Stream a collection's BSON documents into the target.
    fn restore_bson(&mut self, intent: &Intent, source: &mut dyn Read) -> RestoreResult<()>;

    /// Build the given indexes on a finished collection.
    fn restore_indexes(&mut self, intent: &Intent, indexes: &[IndexDocument])
        -> RestoreResult<()>;

    /// Decode a `system.indexes` BSON stream into index definitions grouped
    /// by collection, optionally filtered to one collection.
    fn system_indexes(
        &mut self,
        collection_filter: Option<&str>,
        source: &mut dyn Read,
    ) -> RestoreResult<HashMap<String, Vec<IndexDocument>>>;
}
