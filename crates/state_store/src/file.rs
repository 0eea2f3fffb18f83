//! FileStateStore - single JSON document on disk
//!
//! `save` writes `<path>.tmp`, fsyncs it and renames it over `<path>`, so a
//! reader (or a crash) only ever sees the old or the new document.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use contracts::{ContractError, Snapshot, StateStore};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

const BACKEND: &str = "file";

/// Snapshot store backed by one file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store for the given document path
    ///
    /// Nothing is touched on disk until the first `save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used for the write-then-rename step
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, op: &str, e: std::io::Error) -> ContractError {
        ContractError::storage_unavailable(
            BACKEND,
            format!("{op} '{}': {e}", self.path.display()),
        )
    }

    async fn write_atomically(&self, contents: &str) -> std::io::Result<()> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        if let Some(parent) = parent {
            sync_dir(parent).await;
        }

        Ok(())
    }
}

/// Persist the rename itself
#[cfg(unix)]
async fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir).await {
        if let Err(e) = handle.sync_all().await {
            warn!(dir = %dir.display(), error = %e, "Directory fsync failed");
        }
    }
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) {}

impl StateStore for FileStateStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    #[instrument(name = "file_store_load", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Snapshot>, ContractError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let snapshot = Snapshot::from_document(&raw)?;
                debug!(
                    sequence = snapshot.sequence,
                    ids = snapshot.len(),
                    "Snapshot loaded"
                );
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot on disk yet");
                Ok(None)
            }
            Err(e) => Err(self.io_error("read", e)),
        }
    }

    #[instrument(
        name = "file_store_save",
        skip(self, snapshot),
        fields(path = %self.path.display(), sequence = snapshot.sequence)
    )]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), ContractError> {
        let document = snapshot.to_document()?;
        self.write_atomically(&document)
            .await
            .map_err(|e| self.io_error("write", e))?;
        debug!(ids = snapshot.len(), "Snapshot saved");
        Ok(())
    }

    #[instrument(name = "file_store_reset", skip(self), fields(path = %self.path.display()))]
    async fn reset(&self) -> Result<(), ContractError> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(removed = %path.display(), "Removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error("remove", e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("snapshot.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested/state/snapshot.json"));
        let snapshot = Snapshot::from((3, ["u1", "u2"]));

        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = Snapshot::from((9, ["a", "b", "c"]));

        FileStateStore::new(&path).save(&snapshot).await.unwrap();

        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_interrupted_save_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("snapshot.json"));
        let previous = Snapshot::from((1, ["u1"]));
        store.save(&previous).await.unwrap();

        // Crash half way through writing the temp file: rename never happened
        std::fs::write(store.temp_path(), r#"{"format_version": 1, "sequence": 2, "ids": ["u1", "#)
            .unwrap();
        assert_eq!(store.load().await.unwrap(), Some(previous.clone()));

        // Crash after a complete temp write but before the rename
        let next = Snapshot::from((2, ["u1", "u2"]));
        std::fs::write(store.temp_path(), next.to_document().unwrap()).unwrap();
        assert_eq!(store.load().await.unwrap(), Some(previous));

        // The next successful save replaces the stale temp file
        store.save(&next).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_partial_document() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("snapshot.json"));
        store.save(&Snapshot::from((0, ["seed"]))).await.unwrap();

        let reader_store = store.clone();
        let reader = tokio::spawn(async move {
            let mut last_seen = 0;
            for _ in 0..200 {
                let snapshot = reader_store
                    .load()
                    .await
                    .expect("load must not fail mid-save")
                    .expect("snapshot exists");
                assert!(snapshot.sequence >= last_seen);
                last_seen = snapshot.sequence;
                tokio::task::yield_now().await;
            }
        });

        for sequence in 1..=50u64 {
            let ids: Vec<String> = (0..sequence).map(|i| format!("user-{i}")).collect();
            store.save(&Snapshot::from((sequence, ids))).await.unwrap();
        }

        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_removes_document() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("snapshot.json"));
        store.save(&Snapshot::from((4, ["x"]))).await.unwrap();

        store.reset().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        // Resetting an empty store is fine
        store.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("snapshot.json"));
        std::fs::write(store.path(), "not json").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, ContractError::SnapshotFormat { .. }));
    }

    #[tokio::test]
    async fn test_unwritable_location_is_storage_unavailable() {
        let dir = tempdir().unwrap();
        // A regular file cannot be used as a parent directory
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = FileStateStore::new(blocker.join("snapshot.json"));

        let err = store.save(&Snapshot::from((1, ["u1"]))).await.unwrap_err();
        assert!(matches!(err, ContractError::StorageUnavailable { .. }));
    }
}
