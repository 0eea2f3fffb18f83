//! MemoryStateStore - in-process store with fault injection
//!
//! Used by tests and dry runs. Clones share the same state, so a test can
//! keep one handle for inspection while the poller owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, Snapshot, StateStore};
use tracing::debug;

const BACKEND: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Option<Snapshot>,
    failing_loads: u32,
    failing_saves: u32,
    load_calls: u32,
    save_calls: u32,
    history: Vec<Snapshot>,
}

/// Snapshot store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.lock().snapshot = Some(snapshot);
        store
    }

    /// Make the next `count` loads fail with `StorageUnavailable`
    pub fn fail_next_loads(&self, count: u32) {
        self.lock().failing_loads = count;
    }

    /// Make the next `count` saves fail with `StorageUnavailable`
    pub fn fail_next_saves(&self, count: u32) {
        self.lock().failing_saves = count;
    }

    /// Currently stored snapshot
    pub fn current(&self) -> Option<Snapshot> {
        self.lock().snapshot.clone()
    }

    /// Every snapshot successfully saved, oldest first
    pub fn history(&self) -> Vec<Snapshot> {
        self.lock().history.clone()
    }

    /// Number of `save` calls, failed ones included
    pub fn save_calls(&self) -> u32 {
        self.lock().save_calls
    }

    /// Number of `load` calls, failed ones included
    pub fn load_calls(&self) -> u32 {
        self.lock().load_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn load(&self) -> Result<Option<Snapshot>, ContractError> {
        let mut state = self.lock();
        state.load_calls += 1;
        if state.failing_loads > 0 {
            state.failing_loads -= 1;
            return Err(ContractError::storage_unavailable(
                BACKEND,
                "injected load failure",
            ));
        }
        Ok(state.snapshot.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), ContractError> {
        let mut state = self.lock();
        state.save_calls += 1;
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            debug!(sequence = snapshot.sequence, "Injected save failure");
            return Err(ContractError::storage_unavailable(
                BACKEND,
                "injected save failure",
            ));
        }
        state.snapshot = Some(snapshot.clone());
        state.history.push(snapshot.clone());
        Ok(())
    }

    async fn reset(&self) -> Result<(), ContractError> {
        self.lock().snapshot = None;
        Ok(())
    }
}
