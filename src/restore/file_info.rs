//! Logical file name classification.

/// What a logical file in the archive contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Raw BSON documents of a collection (`<db>/<col>.bson`).
    Bson,
    /// Collection metadata document (`<db>/<col>.metadata.json`).
    Metadata,
    /// Anything this version does not recognize; skipped by the driver.
    Unknown,
}

/// Classification of one logical file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Database segment, empty for unknown files.
    pub db: String,
    /// Collection segment, empty for unknown files.
    pub collection: String,
    /// Recognized file kind.
    pub kind: FileKind,
}

const BSON_SUFFIX: &str = ".bson";
const METADATA_SUFFIX: &str = ".metadata.json";
const SYSTEM_PREFIX: &str = "system.";

/// Classify a logical file name into `(db, collection, kind)`.
///
/// Total and pure: names that do not match the two recognized shapes
/// (exactly one `/`, a known suffix) come back as [`FileKind::Unknown`]
/// with empty segments, so unrecognized future file kinds degrade to
/// being skipped.
pub fn classify(name: &str) -> FileInfo {
    if let Some((db, file)) = name.split_once('/') {
        if !file.contains('/') {
            if let Some(collection) = file.strip_suffix(METADATA_SUFFIX) {
                return FileInfo {
                    db: db.to_string(),
                    collection: collection.to_string(),
                    kind: FileKind::Metadata,
                };
            }
            if let Some(collection) = file.strip_suffix(BSON_SUFFIX) {
                return FileInfo {
                    db: db.to_string(),
                    collection: collection.to_string(),
                    kind: FileKind::Bson,
                };
            }
        }
    }
    FileInfo {
        db: String::new(),
        collection: String::new(),
        kind: FileKind::Unknown,
    }
}

/// True for collections in the reserved `system.` namespace.
pub fn is_system_collection(collection: &str) -> bool {
    collection.starts_with(SYSTEM_PREFIX)
}

/// Order a database's collections for dumping: `system.*` collections
/// first, relative order otherwise preserved.
///
/// The restore driver consumes the archive in one pass and applies a
/// database's `system.indexes` entries to the user collections that follow,
/// so producers must emit system collections first.
pub fn system_collections_first<S: AsRef<str>>(collections: &[S]) -> Vec<String> {
    let mut ordered = Vec::with_capacity(collections.len());
    for name in collections {
        if is_system_collection(name.as_ref()) {
            ordered.push(name.as_ref().to_string());
        }
    }
    for name in collections {
        if !is_system_collection(name.as_ref()) {
            ordered.push(name.as_ref().to_string());
        }
    }
    ordered
}
