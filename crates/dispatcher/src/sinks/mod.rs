//! Sink implementations
//!
//! Contains LogSink, FileSink, and WebhookSink, plus the `Notification`
//! rendering they share.

mod file;
mod log;
mod notification;
mod webhook;

pub use self::file::FileSink;
pub use self::log::LogSink;
pub use self::notification::Notification;
pub use self::webhook::WebhookSink;
