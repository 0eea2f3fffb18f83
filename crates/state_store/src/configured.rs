//! ConfiguredStore - backend selected from `StoreConfig`

use contracts::{ContractError, Snapshot, StateStore, StoreConfig};
use tracing::info;

use crate::{DatabaseStateStore, FileStateStore};

/// The store named by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredStore {
    File(FileStateStore),
    Database(DatabaseStateStore),
}

impl ConfiguredStore {
    /// Open the configured backend
    ///
    /// # Errors
    /// `ConfigurationInvalid` / `StorageUnavailable` from the backend
    pub async fn open(config: &StoreConfig) -> Result<Self, ContractError> {
        let store = match config {
            StoreConfig::File { path } => Self::File(FileStateStore::new(path)),
            StoreConfig::Database { uri, key } => {
                Self::Database(DatabaseStateStore::connect(uri, key.clone()).await?)
            }
        };
        info!(backend = store.backend(), "State store opened");
        Ok(store)
    }
}

impl StateStore for ConfiguredStore {
    fn backend(&self) -> &str {
        match self {
            Self::File(store) => store.backend(),
            Self::Database(store) => store.backend(),
        }
    }

    async fn load(&self) -> Result<Option<Snapshot>, ContractError> {
        match self {
            Self::File(store) => store.load().await,
            Self::Database(store) => store.load().await,
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), ContractError> {
        match self {
            Self::File(store) => store.save(snapshot).await,
            Self::Database(store) => store.save(snapshot).await,
        }
    }

    async fn reset(&self) -> Result<(), ContractError> {
        match self {
            Self::File(store) => store.reset().await,
            Self::Database(store) => store.reset().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_through_both_backends() {
        let dir = tempdir().unwrap();
        let configs = [
            StoreConfig::File {
                path: dir.path().join("snapshot.json"),
            },
            StoreConfig::Database {
                uri: format!("sqlite://{}", dir.path().join("state.db").display()),
                key: "stargazer_snapshot".into(),
            },
        ];

        for config in &configs {
            let store = ConfiguredStore::open(config).await.unwrap();
            assert_eq!(store.backend(), config.backend());
            assert_eq!(store.load().await.unwrap(), None);

            let snapshot = Snapshot::from((2, ["u1", "u2"]));
            store.save(&snapshot).await.unwrap();
            let loaded = store.load().await.unwrap().unwrap();
            assert_eq!(loaded.ids, snapshot.ids);
            assert_eq!(loaded.sequence, snapshot.sequence);

            store.reset().await.unwrap();
            assert_eq!(store.load().await.unwrap(), None);
        }
    }
}
