//! WebhookSink - POSTs each notification as JSON

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ContractError, Entity, NotificationSink};
use reqwest::Client;
use tracing::{debug, instrument};

use super::Notification;
use crate::error::DispatcherError;

/// Sink that posts rendered notifications to an HTTP endpoint
pub struct WebhookSink {
    name: String,
    url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl WebhookSink {
    /// Create a new WebhookSink
    ///
    /// `timeout` bounds each request; the dispatcher applies its own
    /// delivery timeout on top.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DispatcherError::HttpClient {
                sink: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            url: url.into(),
            bearer_token,
            client,
        })
    }

    /// Create from params (for factory); requires `url`, accepts `bearer_token`
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let url = match params.get("url").filter(|u| !u.is_empty()) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.clone(),
            Some(url) => {
                return Err(DispatcherError::InvalidParam {
                    sink: name,
                    param: "url",
                    message: format!("expected an http(s) url, got '{url}'"),
                })
            }
            None => {
                return Err(DispatcherError::MissingParam {
                    sink: name,
                    param: "url",
                })
            }
        };
        let bearer_token = params.get("bearer_token").cloned();

        Self::new(name, url, bearer_token, timeout)
    }
}

impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "webhook_sink_deliver",
        skip(self, entity),
        fields(sink = %self.name, entity = %entity.id)
    )]
    async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&Notification::render(entity));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            ContractError::sink_delivery(&self.name, &entity.id, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContractError::sink_delivery(
                &self.name,
                &entity.id,
                format!("webhook answered {status}: {body}"),
            ));
        }

        debug!(status = %status, "Webhook accepted notification");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "WebhookSink closed");
        Ok(())
    }
}
