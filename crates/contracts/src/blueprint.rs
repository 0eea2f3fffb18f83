//! WatcherBlueprint - Config Loader output
//!
//! Describes the complete watcher configuration: poll timing, upstream source,
//! state store backend and notification sink routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::CommitPolicy;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Poll loop timing and policies
    #[serde(default)]
    pub poller: PollerConfig,

    /// Upstream event source
    pub source: SourceConfig,

    /// Snapshot persistence backend
    pub store: StoreConfig,

    /// Notification routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Fixed interval between cycles (seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upstream fetch timeout (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Per-sink, per-entity delivery timeout (seconds)
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,

    /// First backoff delay after a failed fetch (seconds)
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,

    /// Backoff cap (seconds)
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Growth factor between consecutive backoff delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Bounded attempts for store load/save before escalating
    #[serde(default = "default_save_max_attempts")]
    pub save_max_attempts: u32,

    /// Pause between store attempts (milliseconds)
    #[serde(default = "default_save_retry_delay_ms")]
    pub save_retry_delay_ms: u64,

    /// Record but do not notify entities seen on the very first run
    #[serde(default)]
    pub suppress_first_run: bool,

    /// Whether sink failures hold back the snapshot commit
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn save_retry_delay(&self) -> Duration {
        Duration::from_millis(self.save_retry_delay_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            save_max_attempts: default_save_max_attempts(),
            save_retry_delay_ms: default_save_retry_delay_ms(),
            suppress_first_run: false,
            commit_policy: CommitPolicy::default(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_delivery_timeout_secs() -> u64 {
    10
}

fn default_backoff_initial_secs() -> u64 {
    5
}

fn default_backoff_max_secs() -> u64 {
    300
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_save_max_attempts() -> u32 {
    5
}

fn default_save_retry_delay_ms() -> u64 {
    500
}

/// Upstream HTTP feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Feed URL returning a JSON array of entities
    pub url: String,

    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Snapshot store backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Single JSON document at a fixed path
    File { path: PathBuf },

    /// Single row under a logical key in a SQL database
    Database {
        /// Connection URI, e.g. `sqlite://state/stargazer.db`
        uri: String,

        /// Logical document key
        #[serde(default = "default_store_key")]
        key: String,
    },
}

impl StoreConfig {
    /// Backend label
    pub fn backend(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Database { .. } => "database",
        }
    }
}

fn default_store_key() -> String {
    "stargazer_snapshot".to_string()
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Entity kinds this sink ignores
    #[serde(default)]
    pub disabled_kinds: Vec<String>,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    Log,
    File,
    Webhook,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_tagged_by_backend() {
        let file: StoreConfig =
            serde_json::from_str(r#"{"backend":"file","path":"state.json"}"#).unwrap();
        assert_eq!(
            file,
            StoreConfig::File {
                path: PathBuf::from("state.json")
            }
        );

        let db: StoreConfig =
            serde_json::from_str(r#"{"backend":"database","uri":"sqlite::memory:"}"#).unwrap();
        match db {
            StoreConfig::Database { uri, key } => {
                assert_eq!(uri, "sqlite::memory:");
                assert_eq!(key, "stargazer_snapshot");
            }
            other => panic!("unexpected backend: {other:?}"),
        }
    }

    #[test]
    fn test_poller_defaults() {
        let config = PollerConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.backoff_max(), Duration::from_secs(300));
        assert!(!config.suppress_first_run);
        assert_eq!(config.commit_policy, CommitPolicy::Always);
    }
}
