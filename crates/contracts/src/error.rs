//! Layered error definitions
//!
//! Categorized by source: config / fetch / storage / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or contradictory configuration
    #[error("configuration invalid at '{field}': {message}")]
    ConfigurationInvalid { field: String, message: String },

    // ===== Upstream Errors =====
    /// Upstream event source unreachable or returned garbage
    #[error("fetch unavailable: {message}")]
    FetchUnavailable { message: String },

    // ===== Storage Errors =====
    /// State store unreachable (connectivity / permission)
    #[error("storage '{backend}' unavailable: {message}")]
    StorageUnavailable { backend: String, message: String },

    /// Persisted snapshot unreadable
    #[error("snapshot format error: {message}")]
    SnapshotFormat { message: String },

    // ===== Sink Errors =====
    /// Sink failed to deliver one entity
    #[error("sink '{sink_name}' failed to deliver '{entity_id}': {message}")]
    SinkDeliveryFailed {
        sink_name: String,
        entity_id: String,
        message: String,
    },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create fetch error
    pub fn fetch_unavailable(message: impl Into<String>) -> Self {
        Self::FetchUnavailable {
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create snapshot format error
    pub fn snapshot_format(message: impl Into<String>) -> Self {
        Self::SnapshotFormat {
            message: message.into(),
        }
    }

    /// Create sink delivery error
    pub fn sink_delivery(
        sink_name: impl Into<String>,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SinkDeliveryFailed {
            sink_name: sink_name.into(),
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }

    /// Whether the state store could not be reached (worth retrying)
    ///
    /// A `SnapshotFormat` error is not: the stored document stays
    /// unreadable no matter how often it is read.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}
