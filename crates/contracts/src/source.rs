//! EventSource trait - upstream collaborator interface

use crate::{ContractError, Entity};

/// Upstream event source
///
/// Adapts whatever the real upstream API returns into `Entity` values.
/// The engine never sees the wire format.
#[trait_variant::make(EventSource: Send)]
pub trait LocalEventSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Fetch the entities currently visible upstream
    ///
    /// # Errors
    /// `FetchUnavailable` when the upstream cannot be reached or answers garbage
    async fn fetch(&mut self) -> Result<Vec<Entity>, ContractError>;
}
