//! LogSink - logs each notification via tracing

use contracts::{ContractError, Entity, NotificationSink};
use tracing::{info, instrument};

use super::Notification;

/// Sink that logs notifications, useful as a default and for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, entity),
        fields(sink = %self.name, entity = %entity.id)
    )]
    async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError> {
        let note = Notification::render(entity);
        info!(
            kind = note.kind.as_deref().unwrap_or("-"),
            observed_at = %note.observed_at,
            title = %note.title,
            "New entity"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
