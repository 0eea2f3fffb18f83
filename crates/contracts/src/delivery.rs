//! DeliveryRecord - per (entity, sink) outcome of one cycle
//!
//! Ephemeral: records are logged and fed to the commit policy, never persisted.

use std::time::Duration;

use crate::EntityId;

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sink accepted the entity
    Delivered,
    /// Sink filtered the entity out (disabled kind)
    Skipped,
    /// Sink reported an error
    Failed { reason: String },
    /// Sink did not answer within the delivery timeout
    TimedOut,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered | Self::Skipped)
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Outcome of delivering one entity to one sink
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub entity_id: EntityId,
    pub sink: String,
    pub outcome: DeliveryOutcome,
    pub elapsed: Duration,
}

/// When a cycle's snapshot may be committed after dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit regardless of sink failures (dedup tracks observation)
    #[default]
    Always,
    /// Commit if every entity reached at least one sink
    AnySuccess,
    /// Commit only if every (entity, sink) pair succeeded
    AllSuccess,
}
