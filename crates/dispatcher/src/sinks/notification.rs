//! Notification - human-facing rendering of an entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use contracts::{Entity, PayloadValue};
use serde::Serialize;

/// Rendered message posted by webhook sinks and appended by file sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub payload: BTreeMap<String, PayloadValue>,
}

impl Notification {
    /// Render an entity
    ///
    /// Title: payload `title`, else "New {kind}", else "New entity".
    /// Text: payload `text` and `link` on separate lines, else the id.
    pub fn render(entity: &Entity) -> Self {
        let title = match (entity.text_field("title"), entity.kind.as_deref()) {
            (Some(title), _) => title.to_string(),
            (None, Some(kind)) => format!("New {kind}"),
            (None, None) => "New entity".to_string(),
        };

        let lines: Vec<&str> = ["text", "link"]
            .iter()
            .filter_map(|field| entity.text_field(field))
            .filter(|line| !line.is_empty())
            .collect();
        let text = if lines.is_empty() {
            entity.id.clone()
        } else {
            lines.join("\n")
        };

        Self {
            title,
            text,
            id: entity.id.clone(),
            kind: entity.kind.clone(),
            observed_at: entity.observed_at,
            payload: entity.payload.clone(),
        }
    }
}
