//! # Contracts
//!
//! Frozen interface contracts shared by every stargazer crate: the observed
//! `Entity`, the persisted `Snapshot`, per-cycle `DeliveryRecord`s, the
//! configuration blueprint and the three collaborator traits
//! (`EventSource`, `StateStore`, `NotificationSink`).
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - `Entity::id` is the only identity; payloads may change between fetches
//! - A `Snapshot` remembers ids, never full records

mod blueprint;
mod delivery;
mod entity;
mod error;
mod sink;
mod snapshot;
mod source;
mod store;

pub use blueprint::*;
pub use delivery::*;
pub use entity::*;
pub use error::*;
pub use sink::*;
pub use snapshot::*;
pub use source::*;
pub use store::*;
