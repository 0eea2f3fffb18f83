//! # Sources
//!
//! `EventSource` adapters.
//!
//! - `HttpFeedSource`: GETs a JSON array of entities from a feed URL
//! - `MockEventSource`: scripted fetch results for tests and dry runs

mod http;
mod mock;

pub use contracts::{Entity, EventSource};
pub use http::HttpFeedSource;
pub use mock::MockEventSource;
