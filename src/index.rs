//! Offset index: record kind → byte offsets, built in one cheap pass.
//!
//! Offsets point at record boundaries (the first header byte) in the
//! DECODED stream, so they stay valid whatever envelope the file arrived
//! in.  Entries are keyed by symbolic record id; kinds the registry does
//! not know for the file's version land under the synthetic [`UNKNOWN_KIND`]
//! bucket so nothing is silently dropped.
//!
//! An index is immutable once built — rebuilding replaces it wholesale —
//! and can be snapshotted to bytes and restored, for callers that keep
//! indexes next to slow-to-scan files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bucket for records whose `(REC_TYP, REC_SUB)` the registry does not know.
pub const UNKNOWN_KIND: &str = "???";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetIndex {
    entries:      BTreeMap<String, Vec<u64>>,
    record_count: u64,
}

impl OffsetIndex {
    pub fn new() -> Self {
        OffsetIndex::default()
    }

    pub(crate) fn insert(&mut self, id: &str, offset: u64) {
        self.entries.entry(id.to_string()).or_default().push(offset);
        self.record_count += 1;
    }

    /// Offsets of every record of a kind, in stream order.  Unknown kinds
    /// live under [`UNKNOWN_KIND`].
    pub fn offsets(&self, id: &str) -> &[u64] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Kinds present in the stream, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
