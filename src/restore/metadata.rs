//! Collection metadata documents.
//!
//! A dump stores each collection's options and index definitions as a JSON
//! document in `<collection>.metadata.json`. Index key order is
//! significant (`{"a": 1, "b": -1}` is a different index from
//! `{"b": -1, "a": 1}`), so these types keep object order as written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;

/// One index definition, as found in collection metadata or a
/// `system.indexes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexDocument {
    /// Index name, e.g. `sku_1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ordered field-to-direction key specification.
    #[serde(default)]
    pub key: Map<String, Value>,

    /// Remaining index options (`unique`, `sparse`, version fields, ...),
    /// kept verbatim for the target to interpret.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Parsed `<collection>.metadata.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CollectionMetadata {
    /// Collection creation options (`capped`, `size`, ...).
    #[serde(default)]
    pub options: Map<String, Value>,

    /// Ordered index definitions; by convention the `_id_` index comes
    /// first.
    #[serde(default)]
    pub indexes: Vec<IndexDocument>,
}

impl CollectionMetadata {
    /// Parse a metadata document from a byte stream.
    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }
}
