//! NotificationSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for notification sinks.

use crate::{ContractError, Entity};

/// Notification delivery trait
///
/// All sink implementations must implement this trait. Retrying is the
/// sink's own business; an `Err` is only logged and counted.
#[trait_variant::make(NotificationSink: Send)]
pub trait LocalNotificationSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one entity
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
