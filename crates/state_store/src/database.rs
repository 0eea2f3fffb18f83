//! DatabaseStateStore - snapshot document keyed in a SQL table
//!
//! The same versioned JSON document the file backend writes is stored in one
//! row per logical key. `save` is a single upsert statement, so readers see
//! either the old or the new row.

use std::str::FromStr;

use chrono::Utc;
use contracts::{ContractError, Snapshot, StateStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

const BACKEND: &str = "database";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stargazer_state (
    key        TEXT PRIMARY KEY NOT NULL,
    document   TEXT NOT NULL,
    sequence   INTEGER NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

const UPSERT: &str = r#"
INSERT INTO stargazer_state (key, document, sequence, updated_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(key) DO UPDATE SET
    document = excluded.document,
    sequence = excluded.sequence,
    updated_at = excluded.updated_at
"#;

/// Snapshot store backed by a SQLite database
#[derive(Debug, Clone)]
pub struct DatabaseStateStore {
    pool: SqlitePool,
    key: String,
}

impl DatabaseStateStore {
    /// Connect and ensure the state table exists
    ///
    /// # Errors
    /// - `ConfigurationInvalid` if the URI cannot be parsed
    /// - `StorageUnavailable` if the database cannot be opened
    #[instrument(name = "database_store_connect", skip(key))]
    pub async fn connect(uri: &str, key: impl Into<String>) -> Result<Self, ContractError> {
        if !uri.starts_with("sqlite:") {
            return Err(ContractError::config_invalid(
                "store.uri",
                format!("unsupported database uri '{uri}', expected sqlite:"),
            ));
        }

        let options = SqliteConnectOptions::from_str(uri)
            .map_err(|e| ContractError::config_invalid("store.uri", e.to_string()))?
            .create_if_missing(true);

        // One connection: cycles never overlap, and `sqlite::memory:`
        // databases live exactly as long as their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(db_error)?;

        let key = key.into();
        info!(key = %key, "Database state store ready");

        Ok(Self { pool, key })
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn db_error(e: sqlx::Error) -> ContractError {
    ContractError::storage_unavailable(BACKEND, e.to_string())
}

impl StateStore for DatabaseStateStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    #[instrument(name = "database_store_load", skip(self), fields(key = %self.key))]
    async fn load(&self) -> Result<Option<Snapshot>, ContractError> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM stargazer_state WHERE key = ?1")
                .bind(&self.key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        match document {
            Some(raw) => {
                let snapshot = Snapshot::from_document(&raw)?;
                debug!(sequence = snapshot.sequence, "Snapshot loaded");
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    #[instrument(
        name = "database_store_save",
        skip(self, snapshot),
        fields(key = %self.key, sequence = snapshot.sequence)
    )]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), ContractError> {
        let document = snapshot.to_document()?;
        let sequence = i64::try_from(snapshot.sequence).map_err(|_| {
            ContractError::snapshot_format(format!(
                "sequence {} does not fit the database column",
                snapshot.sequence
            ))
        })?;

        sqlx::query(UPSERT)
            .bind(&self.key)
            .bind(document)
            .bind(sequence)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!(ids = snapshot.len(), "Snapshot upserted");
        Ok(())
    }

    #[instrument(name = "database_store_reset", skip(self), fields(key = %self.key))]
    async fn reset(&self) -> Result<(), ContractError> {
        let result = sqlx::query("DELETE FROM stargazer_state WHERE key = ?1")
            .bind(&self.key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        debug!(rows = result.rows_affected(), "Snapshot deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn memory_store(key: &str) -> DatabaseStateStore {
        DatabaseStateStore::connect("sqlite::memory:", key)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_loads_empty() {
        let store = memory_store("stargazer_snapshot").await;
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = memory_store("stargazer_snapshot").await;
        let snapshot = Snapshot::from((5, ["u1", "u2", "u3"]));

        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_upsert_replaces_document() {
        let store = memory_store("stargazer_snapshot").await;
        store.save(&Snapshot::from((1, ["u1"]))).await.unwrap();
        store.save(&Snapshot::from((2, ["u1", "u2"]))).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.sequence, 2);
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_deletes_only_own_key() {
        let dir = tempdir().unwrap();
        let uri = format!("sqlite://{}", dir.path().join("state.db").display());
        let first = DatabaseStateStore::connect(&uri, "first").await.unwrap();
        first.save(&Snapshot::from((1, ["a"]))).await.unwrap();
        first.close().await;

        let second = DatabaseStateStore::connect(&uri, "second").await.unwrap();
        second.save(&Snapshot::from((1, ["b"]))).await.unwrap();
        second.reset().await.unwrap();
        assert_eq!(second.load().await.unwrap(), None);
        second.close().await;

        let first = DatabaseStateStore::connect(&uri, "first").await.unwrap();
        assert_eq!(
            first.load().await.unwrap(),
            Some(Snapshot::from((1, ["a"])))
        );
    }

    #[tokio::test]
    async fn test_survives_reconnect() {
        let dir = tempdir().unwrap();
        let uri = format!("sqlite://{}", dir.path().join("state.db").display());
        let snapshot = Snapshot::from((12, ["x", "y"]));

        let store = DatabaseStateStore::connect(&uri, "stargazer_snapshot")
            .await
            .unwrap();
        store.save(&snapshot).await.unwrap();
        store.close().await;

        let reopened = DatabaseStateStore::connect(&uri, "stargazer_snapshot")
            .await
            .unwrap();
        assert_eq!(reopened.load().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_configuration_error() {
        let err = DatabaseStateStore::connect("postgres://not-sqlite", "k")
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::ConfigurationInvalid { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_storage_unavailable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let uri = format!("sqlite://{}", blocker.join("state.db").display());

        let err = DatabaseStateStore::connect(&uri, "k").await.unwrap_err();
        assert!(matches!(err, ContractError::StorageUnavailable { .. }));
    }
}
