//! Entity - one observed remote item

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable entity identifier
pub type EntityId = String;

/// Scalar payload value carried by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PayloadValue {
    /// Borrow the value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One observed remote item (a stargazer, follower, video, ...)
///
/// Identity is `id` alone. The payload is source-specific metadata and may
/// differ between two observations of the same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    pub id: EntityId,

    /// When the upstream source says the item appeared
    pub observed_at: DateTime<Utc>,

    /// Optional event kind (e.g. "star", "youtube_video"), used for sink filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Opaque source metadata
    #[serde(default)]
    pub payload: BTreeMap<String, PayloadValue>,
}

impl Entity {
    /// Create an entity with an empty payload
    pub fn new(id: impl Into<EntityId>, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            observed_at,
            kind: None,
            payload: BTreeMap::new(),
        }
    }

    /// Set the event kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Add a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Look up a text payload field
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(PayloadValue::as_text)
    }
}
