//! Dispatcher - fan-out of one cycle's new entities to every sink

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use contracts::{
    CommitPolicy, DeliveryOutcome, DeliveryRecord, Entity, SinkConfig, SinkType,
};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, WebhookSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
    /// Bound on each (entity, sink) delivery
    pub delivery_timeout: Duration,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Build the sinks and start their workers
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            handles.push(create_sink_handle(sink_config, self.config.delivery_timeout)?);
        }
        Ok(Dispatcher { handles })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(
    config: &SinkConfig,
    delivery_timeout: Duration,
) -> Result<SinkHandle, DispatcherError> {
    let disabled_kinds = config.disabled_kinds.clone();
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::spawn(
            LogSink::new(&config.name),
            disabled_kinds,
            delivery_timeout,
        ),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)?;
            SinkHandle::spawn(sink, disabled_kinds, delivery_timeout)
        }
        SinkType::Webhook => {
            let sink = WebhookSink::from_params(&config.name, &config.params, delivery_timeout)?;
            SinkHandle::spawn(sink, disabled_kinds, delivery_timeout)
        }
    };
    Ok(handle)
}

/// Every delivery record of one dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    records: Vec<DeliveryRecord>,
    event_count: usize,
    sink_count: usize,
}

impl DispatchReport {
    /// All records, grouped by sink in configuration order
    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    /// Number of pairs with the given outcome label
    pub fn count(&self, label: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome.label() == label)
            .count()
    }

    /// Number of failed or timed out pairs
    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failure()).count()
    }

    /// Whether the cycle's snapshot may be committed under `policy`
    ///
    /// A dispatch with no events or no sinks never blocks a commit.
    pub fn should_commit(&self, policy: CommitPolicy) -> bool {
        if self.event_count == 0 || self.sink_count == 0 {
            return true;
        }
        match policy {
            CommitPolicy::Always => true,
            CommitPolicy::AllSuccess => self.failures() == 0,
            CommitPolicy::AnySuccess => {
                let reached: HashSet<&str> = self
                    .records
                    .iter()
                    .filter(|r| r.outcome.is_success())
                    .map(|r| r.entity_id.as_str())
                    .collect();
                let expected: HashSet<&str> =
                    self.records.iter().map(|r| r.entity_id.as_str()).collect();
                reached.len() == expected.len()
            }
        }
    }
}

/// Fans events out to sinks and collects their delivery records
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Configured sink names
    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver `events` to every sink and wait for all outcomes
    ///
    /// Sinks work concurrently, each in its own task; within one sink the
    /// events are delivered in the given order. Never fails: a sink that
    /// cannot answer is reported as `Failed` for every event.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, events),
        fields(events = events.len(), sinks = self.handles.len())
    )]
    pub async fn dispatch(&self, events: &[Entity]) -> DispatchReport {
        let mut report = DispatchReport {
            records: Vec::with_capacity(events.len() * self.handles.len()),
            event_count: events.len(),
            sink_count: self.handles.len(),
        };
        if events.is_empty() || self.handles.is_empty() {
            return report;
        }

        let batch = Arc::new(events.to_vec());

        // Submit everywhere first so sinks run concurrently
        let mut pending = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            pending.push((handle.name(), handle.submit(Arc::clone(&batch)).await));
        }

        for (sink, receiver) in pending {
            let records = match receiver {
                Some(rx) => rx.await.map_err(|_| "sink worker dropped the batch"),
                None => Err("sink worker is not running"),
            };
            match records {
                Ok(records) => report.records.extend(records),
                Err(reason) => {
                    error!(sink, reason, "No delivery records from sink");
                    report
                        .records
                        .extend(events.iter().map(|e| DeliveryRecord {
                            entity_id: e.id.clone(),
                            sink: sink.to_string(),
                            outcome: DeliveryOutcome::Failed {
                                reason: reason.to_string(),
                            },
                            elapsed: Duration::ZERO,
                        }));
                }
            }
        }

        let failures = report.failures();
        if failures > 0 {
            warn!(failures, "Dispatch finished with failures");
        } else {
            debug!(records = report.records.len(), "Dispatch finished");
        }
        report
    }

    /// Stop every sink worker, closing the sinks
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    delivery_timeout: Duration,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
        delivery_timeout,
    };
    DispatcherBuilder::new(config).build().await
}
