//! StateStore trait - pluggable snapshot persistence

use crate::{ContractError, Snapshot};

/// Snapshot persistence capability
///
/// Implementations must make `save` atomic with respect to readers: a
/// concurrent `load` (in this process or outside it) never observes a
/// partially written snapshot. After `save(s)` returns `Ok`, every later
/// `load` returns `s` or a later snapshot.
#[trait_variant::make(StateStore: Send)]
pub trait LocalStateStore {
    /// Backend name (used for logging/metrics)
    fn backend(&self) -> &str;

    /// Load the last committed snapshot, `None` if nothing was ever saved
    async fn load(&self) -> Result<Option<Snapshot>, ContractError>;

    /// Atomically replace the stored snapshot
    async fn save(&self, snapshot: &Snapshot) -> Result<(), ContractError>;

    /// Destroy the stored snapshot (operator action)
    async fn reset(&self) -> Result<(), ContractError>;
}
