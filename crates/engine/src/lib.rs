//! # Engine
//!
//! The poll loop: fetch → deduplicate → dispatch → persist.
//!
//! - `Deduplicator`: pure diff of a fetch against the last snapshot
//! - `Backoff`: exponential delay after consecutive fetch failures
//! - `Poller`: the cycle state machine and its background task
//! - `PollerHandle`: stop signal and result of a running poller
//!
//! Delivery is at-least-once: a snapshot is only committed after its
//! dispatch finished, and a failed commit retries the save alone.

mod backoff;
mod dedup;
mod error;
mod poller;
mod stats;

pub use backoff::Backoff;
pub use dedup::{DedupOutcome, Deduplicator};
pub use error::EngineError;
pub use poller::{CycleReport, Poller, PollerHandle, PollerState};
pub use stats::PollerStats;
