//! HttpFeedSource - JSON feed over HTTP

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ContractError, Entity, EventSource, SourceConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, instrument};

/// Source that GETs a feed URL answering with `[Entity, ...]`
pub struct HttpFeedSource {
    url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl HttpFeedSource {
    /// Build from configuration
    ///
    /// # Errors
    /// `ConfigurationInvalid` for header names/values reqwest rejects
    pub fn new(config: &SourceConfig, timeout: Duration) -> Result<Self, ContractError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(header_map(&config.headers)?)
            .build()
            .map_err(|e| ContractError::config_invalid("source", e.to_string()))?;

        Ok(Self {
            url: config.url.clone(),
            bearer_token: config.bearer_token.clone(),
            client,
        })
    }

    fn unavailable(&self, message: impl std::fmt::Display) -> ContractError {
        ContractError::fetch_unavailable(format!("{}: {message}", self.url))
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ContractError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let field = format!("source.headers.{name}");
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ContractError::config_invalid(&field, e.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ContractError::config_invalid(&field, e.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

impl EventSource for HttpFeedSource {
    fn name(&self) -> &str {
        "http_feed"
    }

    #[instrument(name = "http_feed_fetch", skip(self), fields(url = %self.url))]
    async fn fetch(&mut self) -> Result<Vec<Entity>, ContractError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.unavailable(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("upstream answered {status}")));
        }

        let body = response.bytes().await.map_err(|e| self.unavailable(e))?;
        let entities: Vec<Entity> = serde_json::from_slice(&body)
            .map_err(|e| self.unavailable(format!("malformed feed: {e}")))?;

        debug!(count = entities.len(), "Feed fetched");
        Ok(entities)
    }
}
