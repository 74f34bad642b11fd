//! Single-pass tar restore driver.
//!
//! A chunked dump archive interleaves, per collection, a metadata document
//! and a BSON data stream, with `system.*` collections leading their
//! database. Restoring it is a streaming problem: the driver sees each
//! logical file exactly once, in archive order, and must decide when to
//! begin a collection, when to apply metadata, and when a collection is
//! finished so its indexes can be built.
//!
//! The pieces:
//!
//! - [`file_info`]: pure classifier from logical file names to
//!   `(database, collection, kind)`.
//! - [`names`]: database and collection name grammar checks; failures make
//!   the driver skip a file, never abort.
//! - [`metadata`]: serde types for `<collection>.metadata.json` documents.
//! - [`target`]: the [`RestoreTarget`] collaborator trait and the
//!   per-collection [`Intent`](target::Intent) handle; everything that
//!   actually touches a database lives behind it.
//! - [`driver`]: the [`RestoreDriver`] state machine itself.
//!
//! Skippable conditions (unknown file kind, invalid names, late metadata)
//! are logged and recovered; reader IO errors, tar structure errors, and
//! collaborator failures abort the restore.

pub mod driver;
pub mod error;
pub mod file_info;
pub mod metadata;
pub mod names;
pub mod target;

pub use driver::{RestoreDriver, RestoreOptions};
pub use error::{RestoreError, RestoreResult};
pub use file_info::{classify, system_collections_first, FileInfo, FileKind};
pub use metadata::{CollectionMetadata, IndexDocument};
pub use names::{validate_collection_name, validate_db_name, NameError};
pub use target::{Intent, RestoreTarget};
