//! Snapshot - the persisted set of known entity ids
//!
//! Both store backends persist the same versioned JSON document:
//! `{ "format_version": 1, "sequence": n, "ids": [...] }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ContractError, EntityId};

/// Current on-disk document format
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Identifiers known as of the last completed cycle
///
/// `sequence` increases by one per committed cycle. `ids` only grows;
/// nothing but an explicit store reset removes members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub sequence: u64,
    pub ids: BTreeSet<EntityId>,
}

impl Snapshot {
    /// Create an empty snapshot (sequence 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id has been observed before
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of known ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no id is known
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Encode as the persisted JSON document
    pub fn to_document(&self) -> Result<String, ContractError> {
        let doc = SnapshotDocument {
            format_version: SNAPSHOT_FORMAT_VERSION,
            sequence: self.sequence,
            ids: self.ids.iter().cloned().collect(),
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| ContractError::snapshot_format(format!("encode failed: {e}")))
    }

    /// Decode a persisted JSON document
    ///
    /// # Errors
    /// `SnapshotFormat` for malformed JSON or an unknown format version
    pub fn from_document(raw: &str) -> Result<Self, ContractError> {
        let doc: SnapshotDocument = serde_json::from_str(raw)
            .map_err(|e| ContractError::snapshot_format(format!("decode failed: {e}")))?;

        if doc.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ContractError::snapshot_format(format!(
                "unsupported format_version {} (expected {})",
                doc.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(Self {
            sequence: doc.sequence,
            ids: doc.ids.into_iter().collect(),
        })
    }
}

impl<I, S> From<(u64, I)> for Snapshot
where
    I: IntoIterator<Item = S>,
    S: Into<EntityId>,
{
    fn from((sequence, ids): (u64, I)) -> Self {
        Self {
            sequence,
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Serialized form of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDocument {
    format_version: u32,
    sequence: u64,
    ids: Vec<EntityId>,
}
