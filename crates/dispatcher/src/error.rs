//! Dispatcher error types
//!
//! Only sink construction can fail at the dispatcher level. Delivery
//! failures never surface as errors; they become `DeliveryRecord`s.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Required sink parameter absent or empty
    #[error("sink '{sink}' requires a '{param}' parameter")]
    MissingParam { sink: String, param: &'static str },

    /// Sink parameter present but unusable
    #[error("sink '{sink}' parameter '{param}' is invalid: {message}")]
    InvalidParam {
        sink: String,
        param: &'static str,
        message: String,
    },

    /// HTTP client could not be built
    #[error("sink '{sink}' failed to build its HTTP client: {source}")]
    HttpClient {
        sink: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DispatcherError {
    /// Name of the sink that could not be created
    pub fn sink(&self) -> &str {
        match self {
            Self::MissingParam { sink, .. }
            | Self::InvalidParam { sink, .. }
            | Self::HttpClient { sink, .. } => sink,
        }
    }
}
