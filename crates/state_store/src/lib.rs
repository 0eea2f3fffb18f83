//! # State Store
//!
//! Snapshot persistence backends.
//!
//! Responsibilities:
//! - `FileStateStore`: one versioned JSON document, write-temp-then-rename
//! - `DatabaseStateStore`: one row per logical key, upsert (SQLite via sqlx)
//! - `MemoryStateStore`: in-process store with fault injection for tests
//! - `ConfiguredStore`: backend chosen from `StoreConfig`
//!
//! Every backend implements `contracts::StateStore`; the engine never names a
//! concrete backend.

mod configured;
mod database;
mod file;
mod memory;

pub use configured::ConfiguredStore;
pub use contracts::{Snapshot, StateStore};
pub use database::DatabaseStateStore;
pub use file::FileStateStore;
pub use memory::MemoryStateStore;
