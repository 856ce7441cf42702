//! Index artifacts the write path emits: typed fields keyed by index rule
//! and series, and the documents carrying them into the element index and
//! the per-segment series index.

use crate::types::SeriesId;

/// Addresses one indexed term: which rule produced it, how to analyze it,
/// and which series it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldKey {
    pub index_rule_id: u32,
    pub analyzer: String,
    pub series_id: SeriesId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexField {
    pub key: FieldKey,
    pub value: FieldValue,
    /// Copied verbatim from the index rule; fields that never sort skip the
    /// doc-values sidecar.
    pub no_sort: bool,
}

/// One unit of index write. Element documents carry `fields` and a
/// `timestamp`; series documents carry the canonical `entity_values` bytes
/// under the series hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub doc_id: u64,
    pub entity_values: Option<Vec<u8>>,
    pub fields: Vec<IndexField>,
    pub timestamp: Option<i64>,
}
