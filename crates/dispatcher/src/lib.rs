//! # Dispatcher
//!
//! Notification fan-out module.
//!
//! Responsibilities:
//! - Deliver each new entity to every configured sink
//! - Isolate sinks from each other: one worker task per sink, a slow or
//!   failing sink never delays or fails delivery to the others
//! - Bound every (entity, sink) attempt by the delivery timeout
//! - Report one `DeliveryRecord` per pair so the poller can apply its
//!   commit policy

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DeliveryOutcome, DeliveryRecord, Entity, NotificationSink};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, Notification, WebhookSink};
