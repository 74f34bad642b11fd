//! The tar restore driver.
//!
//! One [`RestoreDriver`] consumes one archive in a single forward pass. For
//! every logical file it classifies the name, tracks database and
//! collection transitions, and dispatches the file's bytes to the
//! [`RestoreTarget`]. Index builds are deferred: a collection's indexes,
//! taken from its metadata document or failing that from the database's
//! `system.indexes` entry, are applied when the pass moves on to the next
//! collection, so data inserts never race an index build.
//!
//! Per-collection lifecycle: begin → metadata (optional) → data → indexes
//! on transition out. System collections skip begin and the index step;
//! `system.indexes` itself is decoded into per-collection definitions
//! instead of being restored as data.
//!
//! The archive must present system collections before the user collections
//! of their database, metadata before data within a collection, and must
//! not repeat a collection within a database; the driver warns when an
//! archive looks out of order but keeps its guarantees either way.

use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, warn};

use crate::archive::ChunkReader;
use crate::restore::error::RestoreResult;
use crate::restore::file_info::{self, FileKind};
use crate::restore::metadata::IndexDocument;
use crate::restore::names;
use crate::restore::target::{Intent, RestoreTarget};

/// Driver configuration, fixed for the lifetime of a pass.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Restore only this database; files for other databases are skipped.
    pub db: Option<String>,
    /// Restore only this collection (requires `db`); other collections are
    /// skipped, except system collections, which are always consumed.
    pub collection: Option<String>,
    /// When false, index definitions found in the archive are ignored and
    /// `system.indexes` streams are restored as ordinary collection data.
    pub build_indexes: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        RestoreOptions {
            db: None,
            collection: None,
            build_indexes: true,
        }
    }
}

/// Single-pass state machine that rebuilds collections and their indexes
/// from a chunked dump archive.
///
/// Create one per archive with [`RestoreDriver::new`] and consume it with
/// [`RestoreDriver::run`].
pub struct RestoreDriver {
    past_dbs: Vec<String>,
    current_db: String,
    single_db: bool,
    past_collections: Vec<String>,
    current_collection: String,
    single_collection: bool,
    collection_filter: Option<String>,
    build_indexes: bool,

    uses_metadata_files: bool,
    restored_metadata: bool,
    restored_bson: bool,
    collection_exists: bool,
    metadata_indexes: Option<Vec<IndexDocument>>,
    system_indexes: Option<HashMap<String, Vec<IndexDocument>>>,
    /// Intent of the most recent accepted file; consulted when flushing
    /// deferred index builds.
    intent: Option<Intent>,
}

impl RestoreDriver {
    /// Create a driver for one archive pass.
    pub fn new(options: RestoreOptions) -> Self {
        let current_db = options.db.unwrap_or_default();
        let current_collection = options.collection.clone().unwrap_or_default();
        RestoreDriver {
            single_db: !current_db.is_empty(),
            single_collection: !current_collection.is_empty(),
            collection_filter: options.collection.filter(|c| !c.is_empty()),
            build_indexes: options.build_indexes,
            past_dbs: Vec::new(),
            current_db,
            past_collections: Vec::new(),
            current_collection,
            uses_metadata_files: false,
            restored_metadata: false,
            restored_bson: false,
            collection_exists: false,
            metadata_indexes: None,
            system_indexes: None,
            intent: None,
        }
    }

    /// Walk the archive once, restoring every eligible logical file, then
    /// flush the final collection's pending index build.
    pub fn run<R, T>(mut self, reader: &mut ChunkReader<R>, target: &mut T) -> RestoreResult<()>
    where
        R: Read,
        T: RestoreTarget,
    {
        while let Some(file_name) = reader.next_file()? {
            self.restore_file(&file_name, reader, target)?;
        }
        self.change_collection("", target)
    }

    fn restore_file<R, T>(
        &mut self,
        file_name: &str,
        reader: &mut ChunkReader<R>,
        target: &mut T,
    ) -> RestoreResult<()>
    where
        R: Read,
        T: RestoreTarget,
    {
        let info = file_info::classify(file_name);
        debug!(
            file = %file_name,
            db = %info.db,
            collection = %info.collection,
            kind = ?info.kind,
            "next file in archive"
        );

        if info.kind == FileKind::Unknown {
            warn!(file = %file_name, "file is of unknown type, skipping");
            return Ok(());
        }
        if let Err(err) = names::validate_db_name(&info.db) {
            warn!(file = %file_name, db = %info.db, error = %err, "invalid database name, skipping");
            return Ok(());
        }
        if let Err(err) = names::validate_collection_name(&info.collection) {
            warn!(
                file = %file_name,
                collection = %info.collection,
                error = %err,
                "invalid collection name, skipping"
            );
            return Ok(());
        }

        let is_system = file_info::is_system_collection(&info.collection);

        if info.db != self.current_db {
            if self.single_db {
                warn!(
                    file = %file_name,
                    db = %self.current_db,
                    "file is not for the restore database, skipping"
                );
                return Ok(());
            }
            if self.past_dbs.iter().any(|db| db == &info.db) {
                warn!(
                    file = %file_name,
                    db = %info.db,
                    "database has already been processed, archive is out of order"
                );
            }
            self.change_database(&info.db, target)?;
        }

        if info.collection != self.current_collection {
            if self.single_collection && !is_system {
                warn!(
                    file = %file_name,
                    collection = %self.current_collection,
                    "file is not for the restore collection, skipping"
                );
                return Ok(());
            }
            if self.past_collections.iter().any(|c| c == &info.collection) {
                warn!(
                    file = %file_name,
                    collection = %info.collection,
                    "collection has already been processed, archive is out of order"
                );
            }
            self.change_collection(&info.collection, target)?;
        }

        if self.restored_bson && info.kind == FileKind::Metadata {
            warn!(
                file = %file_name,
                collection = %self.current_collection,
                "collection data already restored, too late to apply metadata, skipping"
            );
            return Ok(());
        }

        let intent = match target.create_intent(&info.db, &info.collection, info.kind) {
            Some(intent) => intent,
            None => return Ok(()),
        };
        if info.kind == FileKind::Metadata {
            self.uses_metadata_files = true;
        }
        self.intent = Some(intent.clone());

        if !self.restored_metadata && !self.restored_bson && !is_system {
            self.collection_exists = target.begin_collection(&intent)?;
        }

        match info.kind {
            FileKind::Metadata if !is_system => {
                let indexes = target.restore_metadata(&intent, self.collection_exists, reader)?;
                self.metadata_indexes = Some(indexes);
                self.restored_metadata = true;
            }
            FileKind::Bson => {
                if info.collection == "system.indexes" && self.build_indexes {
                    let indexes =
                        target.system_indexes(self.collection_filter.as_deref(), reader)?;
                    self.system_indexes = Some(indexes);
                } else {
                    target.restore_bson(&intent, reader)?;
                    self.restored_bson = true;
                }
            }
            _ => {
                warn!(file = %file_name, "nothing to do with file, skipping");
            }
        }
        Ok(())
    }

    /// Switch to a new database, flushing the previous collection before
    /// dropping per-database index state.
    fn change_database<T: RestoreTarget>(&mut self, db: &str, target: &mut T) -> RestoreResult<()> {
        if !self.current_db.is_empty() {
            self.past_dbs.push(self.current_db.clone());
        }
        self.current_db = db.to_string();
        // Flush before resetting system_indexes: a pending index build fed
        // from system.indexes would otherwise be lost at the boundary.
        self.change_collection("", target)?;
        self.past_collections.clear();
        self.system_indexes = None;
        Ok(())
    }

    /// Switch to a new collection (empty = none), applying the previous
    /// collection's pending index build and resetting per-collection state.
    fn change_collection<T: RestoreTarget>(
        &mut self,
        collection: &str,
        target: &mut T,
    ) -> RestoreResult<()> {
        if !self.current_collection.is_empty() {
            self.past_collections.push(self.current_collection.clone());
        }
        self.current_collection = collection.to_string();
        self.uses_metadata_files = false;

        if self.restored_metadata {
            if let (Some(intent), Some(indexes)) = (&self.intent, &self.metadata_indexes) {
                target.restore_indexes(intent, indexes)?;
            }
        } else if let (Some(intent), Some(map)) = (&self.intent, &self.system_indexes) {
            if let Some(indexes) = map.get(&intent.collection) {
                target.restore_indexes(intent, indexes)?;
            }
        }

        self.restored_metadata = false;
        self.restored_bson = false;
        self.collection_exists = false;
        self.metadata_indexes = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::error::RestoreError;

    /// Minimal target recording only index builds, for exercising the
    /// transition logic directly.
    #[derive(Default)]
    struct IndexRecorder {
        builds: Vec<(String, Vec<String>)>,
    }

    impl RestoreTarget for IndexRecorder {
        fn create_intent(&mut self, db: &str, collection: &str, kind: FileKind) -> Option<Intent> {
            Some(Intent {
                db: db.to_string(),
                collection: collection.to_string(),
                kind,
            })
        }

        fn begin_collection(&mut self, _intent: &Intent) -> RestoreResult<bool> {
            Ok(false)
        }

        fn restore_metadata(
            &mut self,
            _intent: &Intent,
            _collection_exists: bool,
            _source: &mut dyn Read,
        ) -> RestoreResult<Vec<IndexDocument>> {
            Err(RestoreError::target("not used"))
        }

        fn restore_bson(&mut self, _intent: &Intent, _source: &mut dyn Read) -> RestoreResult<()> {
            Ok(())
        }

        fn restore_indexes(
            &mut self,
            intent: &Intent,
            indexes: &[IndexDocument],
        ) -> RestoreResult<()> {
            let names = indexes
                .iter()
                .map(|index| index.name.clone().unwrap_or_default())
                .collect();
            self.builds.push((intent.namespace(), names));
            Ok(())
        }

        fn system_indexes(
            &mut self,
            _collection_filter: Option<&str>,
            _source: &mut dyn Read,
        ) -> RestoreResult<HashMap<String, Vec<IndexDocument>>> {
            Err(RestoreError::target("not used"))
        }
    }

    fn named_index(name: &str) -> IndexDocument {
        IndexDocument {
            name: Some(name.to_string()),
            ..IndexDocument::default()
        }
    }

    fn intent_for(db: &str, collection: &str) -> Intent {
        Intent {
            db: db.to_string(),
            collection: collection.to_string(),
            kind: FileKind::Bson,
        }
    }

    #[test]
    fn test_collection_change_prefers_metadata_indexes() {
        let mut target = IndexRecorder::default();
        let mut driver = RestoreDriver::new(RestoreOptions::default());
        driver.current_collection = "users".to_string();
        driver.intent = Some(intent_for("db1", "users"));
        driver.restored_metadata = true;
        driver.metadata_indexes = Some(vec![named_index("sku_1")]);
        driver.system_indexes = Some(HashMap::from([(
            "users".to_string(),
            vec![named_index("shadowed")],
        )]));

        driver.change_collection("orders", &mut target).unwrap();

        assert_eq!(
            target.builds,
            vec![("db1.users".to_string(), vec!["sku_1".to_string()])]
        );
        assert!(!driver.restored_metadata);
        assert!(driver.metadata_indexes.is_none());
        assert_eq!(driver.past_collections, vec!["users"]);
        assert_eq!(driver.current_collection, "orders");
    }

    #[test]
    fn test_collection_change_falls_back_to_system_indexes() {
        let mut target = IndexRecorder::default();
        let mut driver = RestoreDriver::new(RestoreOptions::default());
        driver.current_collection = "orders".to_string();
        driver.intent = Some(intent_for("db1", "orders"));
        driver.system_indexes = Some(HashMap::from([(
            "orders".to_string(),
            vec![named_index("qty_1")],
        )]));

        driver.change_collection("", &mut target).unwrap();

        assert_eq!(
            target.builds,
            vec![("db1.orders".to_string(), vec!["qty_1".to_string()])]
        );
    }

    #[test]
    fn test_database_change_flushes_before_dropping_system_indexes() {
        let mut target = IndexRecorder::default();
        let mut driver = RestoreDriver::new(RestoreOptions::default());
        driver.current_db = "db1".to_string();
        driver.current_collection = "orders".to_string();
        driver.intent = Some(intent_for("db1", "orders"));
        driver.system_indexes = Some(HashMap::from([(
            "orders".to_string(),
            vec![named_index("qty_1")],
        )]));

        driver.change_database("db2", &mut target).unwrap();

        assert_eq!(
            target.builds,
            vec![("db1.orders".to_string(), vec!["qty_1".to_string()])]
        );
        assert!(driver.system_indexes.is_none());
        assert!(driver.past_collections.is_empty());
        assert_eq!(driver.past_dbs, vec!["db1"]);
        assert_eq!(driver.current_db, "db2");
    }

    #[test]
    fn test_collection_change_without_pending_indexes_is_quiet() {
        let mut target = IndexRecorder::default();
        let mut driver = RestoreDriver::new(RestoreOptions::default());
        driver.current_collection = "users".to_string();
        driver.intent = Some(intent_for("db1", "users"));

        driver.change_collection("orders", &mut target).unwrap();

        assert!(target.builds.is_empty());
    }

    #[test]
    fn test_options_select_single_db_and_collection() {
        let driver = RestoreDriver::new(RestoreOptions {
            db: Some("db1".to_string()),
            collection: Some("users".to_string()),
            build_indexes: true,
        });
        assert!(driver.single_db);
        assert!(driver.single_collection);
        assert_eq!(driver.current_db, "db1");
        assert_eq!(driver.current_collection, "users");
        assert_eq!(driver.collection_filter.as_deref(), Some("users"));

        let driver = RestoreDriver::new(RestoreOptions::default());
        assert!(!driver.single_db);
        assert!(!driver.single_collection);
    }
}
