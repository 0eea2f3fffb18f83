//! SinkHandle - manages a sink with an isolated queue and worker task

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use contracts::{DeliveryOutcome, DeliveryRecord, Entity, NotificationSink};

use crate::metrics::SinkMetrics;

/// Batches queued per worker; the poller submits one batch per cycle
const QUEUE_CAPACITY: usize = 4;

/// One cycle's events plus the channel the worker answers on
struct DeliveryBatch {
    events: Arc<Vec<Entity>>,
    reply: oneshot::Sender<Vec<DeliveryRecord>>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send batches to worker
    tx: mpsc::Sender<DeliveryBatch>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// Entities whose `kind` is in `disabled_kinds` are recorded as
    /// `Skipped` without reaching the sink.
    pub fn spawn<S: NotificationSink + 'static>(
        sink: S,
        disabled_kinds: Vec<String>,
        delivery_timeout: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let metrics = Arc::new(SinkMetrics::new());

        let worker = SinkWorker {
            name: name.clone(),
            disabled_kinds: disabled_kinds.into_iter().collect(),
            delivery_timeout,
            metrics: Arc::clone(&metrics),
        };

        let worker_handle = tokio::spawn(async move {
            worker.run(sink, rx).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a batch for delivery
    ///
    /// Returns the receiver for the batch's records, or `None` if the worker
    /// is gone.
    pub async fn submit(
        &self,
        events: Arc<Vec<Entity>>,
    ) -> Option<oneshot::Receiver<Vec<DeliveryRecord>>> {
        let (reply, rx) = oneshot::channel();
        match self.tx.send(DeliveryBatch { events, reply }).await {
            Ok(()) => Some(rx),
            Err(_) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                None
            }
        }
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

struct SinkWorker {
    name: String,
    disabled_kinds: HashSet<String>,
    delivery_timeout: Duration,
    metrics: Arc<SinkMetrics>,
}

impl SinkWorker {
    /// Consume batches until the handle is dropped
    #[instrument(name = "sink_worker_loop", skip_all, fields(sink = %self.name))]
    async fn run<S: NotificationSink>(self, mut sink: S, mut rx: mpsc::Receiver<DeliveryBatch>) {
        debug!("Sink worker started");

        while let Some(batch) = rx.recv().await {
            let mut records = Vec::with_capacity(batch.events.len());
            for entity in batch.events.iter() {
                records.push(self.deliver_one(&mut sink, entity).await);
            }

            match timeout(self.delivery_timeout, sink.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Flush failed"),
                Err(_) => warn!("Flush timed out"),
            }

            if batch.reply.send(records).is_err() {
                warn!("Dispatcher stopped waiting for delivery records");
            }
        }

        if let Err(e) = sink.close().await {
            error!(error = %e, "Close failed on shutdown");
        }

        debug!("Sink worker stopped");
    }

    async fn deliver_one<S: NotificationSink>(
        &self,
        sink: &mut S,
        entity: &Entity,
    ) -> DeliveryRecord {
        let started = Instant::now();

        let outcome = if self.is_disabled(entity) {
            DeliveryOutcome::Skipped
        } else {
            match timeout(self.delivery_timeout, sink.deliver(entity)).await {
                Ok(Ok(())) => DeliveryOutcome::Delivered,
                Ok(Err(e)) => {
                    error!(entity = %entity.id, error = %e, "Delivery failed");
                    DeliveryOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    warn!(
                        entity = %entity.id,
                        timeout_ms = self.delivery_timeout.as_millis() as u64,
                        "Delivery timed out"
                    );
                    DeliveryOutcome::TimedOut
                }
            }
        };

        self.metrics.record(&outcome);

        DeliveryRecord {
            entity_id: entity.id.clone(),
            sink: self.name.clone(),
            outcome,
            elapsed: started.elapsed(),
        }
    }

    fn is_disabled(&self, entity: &Entity) -> bool {
        entity
            .kind
            .as_ref()
            .is_some_and(|kind| self.disabled_kinds.contains(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contracts::ContractError;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Mock sink for testing
    struct MockSink {
        name: String,
        delivered: Arc<Mutex<Vec<String>>>,
        fail_ids: HashSet<String>,
        delay: Duration,
    }

    impl MockSink {
        fn new(name: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let delivered = Arc::new(Mutex::new(Vec::new()));
            let sink = Self {
                name: name.to_string(),
                delivered: Arc::clone(&delivered),
                fail_ids: HashSet::new(),
                delay: Duration::ZERO,
            };
            (sink, delivered)
        }
    }

    impl NotificationSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail_ids.contains(&entity.id) {
                return Err(ContractError::sink_delivery(
                    &self.name,
                    &entity.id,
                    "mock failure",
                ));
            }
            self.delivered.lock().unwrap().push(entity.id.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn events(ids: &[&str]) -> Arc<Vec<Entity>> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Arc::new(ids.iter().map(|id| Entity::new(*id, at)).collect())
    }

    #[tokio::test]
    async fn test_sink_handle_delivers_in_order() {
        let (sink, delivered) = MockSink::new("test");
        let handle = SinkHandle::spawn(sink, Vec::new(), Duration::from_secs(1));

        let rx = handle.submit(events(&["u1", "u2", "u3"])).await.unwrap();
        let records = rx.await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.outcome == DeliveryOutcome::Delivered));
        assert_eq!(*delivered.lock().unwrap(), vec!["u1", "u2", "u3"]);
        assert_eq!(handle.metrics().delivered_count(), 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let (mut sink, delivered) = MockSink::new("failing");
        sink.fail_ids.insert("u2".into());
        let handle = SinkHandle::spawn(sink, Vec::new(), Duration::from_secs(1));

        let records = handle
            .submit(events(&["u1", "u2", "u3"]))
            .await
            .unwrap()
            .await
            .unwrap();

        // A failure does not stop the remaining entities
        assert!(matches!(records[1].outcome, DeliveryOutcome::Failed { .. }));
        assert_eq!(*delivered.lock().unwrap(), vec!["u1", "u3"]);
        assert_eq!(handle.metrics().failure_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_timeout() {
        let (mut sink, _) = MockSink::new("slow");
        sink.delay = Duration::from_millis(500);
        let handle = SinkHandle::spawn(sink, Vec::new(), Duration::from_millis(20));

        let records = handle.submit(events(&["u1"])).await.unwrap().await.unwrap();

        assert_eq!(records[0].outcome, DeliveryOutcome::TimedOut);
        assert_eq!(handle.metrics().timeout_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_skips_disabled_kinds() {
        let (sink, delivered) = MockSink::new("filtered");
        let handle = SinkHandle::spawn(sink, vec!["tweet".into()], Duration::from_secs(1));

        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let batch = Arc::new(vec![
            Entity::new("t1", at).with_kind("tweet"),
            Entity::new("v1", at).with_kind("video"),
            Entity::new("x1", at),
        ]);
        let records = handle.submit(batch).await.unwrap().await.unwrap();

        assert_eq!(records[0].outcome, DeliveryOutcome::Skipped);
        assert_eq!(records[1].outcome, DeliveryOutcome::Delivered);
        assert_eq!(records[2].outcome, DeliveryOutcome::Delivered);
        assert_eq!(*delivered.lock().unwrap(), vec!["v1", "x1"]);

        handle.shutdown().await;
    }
}
