//! Engine error types

use contracts::ContractError;
use thiserror::Error;

/// Errors that stop the poller
///
/// Fetch and sink failures never end up here; they are retried or recorded.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The state store kept failing past the retry budget
    #[error("state store '{backend}' failed to {operation} after {attempts} attempts: {source}")]
    StoreExhausted {
        backend: String,
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ContractError,
    },

    /// Poller task panicked or was cancelled
    #[error("poller task failed: {0}")]
    TaskFailed(String),

    /// Non-retryable contract error (e.g. unreadable snapshot)
    #[error(transparent)]
    Contract(#[from] ContractError),
}
