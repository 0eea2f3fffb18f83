//! FileSink - appends one JSON line per notification

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{ContractError, Entity, NotificationSink};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::Notification;
use crate::error::DispatcherError;

/// Sink that appends rendered notifications to a JSON-lines file
pub struct FileSink {
    name: String,
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Create a new FileSink; the file is opened on first delivery
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            file: None,
        }
    }

    /// Create from params map (for factory); requires `path`
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        match params.get("path").filter(|p| !p.is_empty()) {
            Some(path) => Ok(Self::new(name, path)),
            None => Err(DispatcherError::MissingParam {
                sink: name,
                param: "path",
            }),
        }
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, entity: &Entity, e: impl std::fmt::Display) -> ContractError {
        ContractError::sink_delivery(&self.name, &entity.id, e.to_string())
    }

    async fn open(&mut self) -> std::io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            debug!(sink = %self.name, path = %self.path.display(), "Output file opened");
            self.file = Some(file);
        }
        // Populated above
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("output file not open"))
    }
}

impl NotificationSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, entity),
        fields(sink = %self.name, entity = %entity.id)
    )]
    async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError> {
        let mut line = serde_json::to_vec(&Notification::render(entity))
            .map_err(|e| self.write_error(entity, e))?;
        line.push(b'\n');

        let result = match self.open().await {
            Ok(file) => file.write_all(&line).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            // Reopen on the next delivery
            self.file = None;
            return Err(self.write_error(entity, e));
        }
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.sync_data().await?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.file = None;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
