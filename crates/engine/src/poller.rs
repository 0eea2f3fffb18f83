//! Poller - the fetch → deduplicate → dispatch → persist cycle
//!
//! ```text
//! Idle → Fetching → Deduplicating → Dispatching → Persisting → Idle
//!           │
//!           └─(fetch failed)→ Backoff → Idle
//! ```
//!
//! The shutdown signal is only looked at between cycles and while waiting
//! (idle or backoff). A dispatch or a save that has started always finishes.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use contracts::{ContractError, EventSource, PollerConfig, Snapshot, StateStore};
use dispatcher::Dispatcher;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::{Backoff, DedupOutcome, Deduplicator, EngineError, PollerStats};

/// Where the poller currently is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Deduplicating,
    Dispatching,
    Persisting,
    Backoff,
    Stopped,
}

impl PollerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Deduplicating => "deduplicating",
            Self::Dispatching => "dispatching",
            Self::Persisting => "persisting",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one cycle that did not stop the poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Snapshot `sequence` was saved
    Committed {
        sequence: u64,
        new_events: usize,
        suppressed: usize,
        failures: usize,
    },
    /// Dispatch ran but the commit policy kept the previous snapshot
    Held { new_events: usize, failures: usize },
    /// Upstream unavailable; the next cycle starts after `retry_in`
    FetchFailed { retry_in: Duration, reason: String },
}

impl CycleReport {
    /// Label used for logs and the `outcome` metric
    pub fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::Held { .. } => "held",
            Self::FetchFailed { .. } => "fetch_failed",
        }
    }
}

/// Drives the watcher cycle over one source, one store and one dispatcher
pub struct Poller<S, T> {
    source: S,
    store: T,
    dispatcher: Dispatcher,
    dedup: Deduplicator,
    backoff: Backoff,
    config: PollerConfig,
    /// Last committed snapshot, `None` until the store was first read
    committed: Option<Option<Snapshot>>,
    state_tx: watch::Sender<PollerState>,
    stats: PollerStats,
}

impl<S, T> Poller<S, T>
where
    S: EventSource + 'static,
    T: StateStore + Sync + 'static,
{
    pub fn new(source: S, store: T, dispatcher: Dispatcher, config: PollerConfig) -> Self {
        let (state_tx, _) = watch::channel(PollerState::Idle);
        Self {
            source,
            store,
            dispatcher,
            dedup: Deduplicator::new(config.suppress_first_run),
            backoff: Backoff::from_config(&config),
            config,
            committed: None,
            state_tx,
            stats: PollerStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> PollerState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Run exactly one cycle
    ///
    /// Fetch failures come back as `CycleReport::FetchFailed`; only a store
    /// that stays unavailable past its retry budget (or an unreadable
    /// snapshot) is an error.
    #[instrument(name = "poller_cycle", skip(self), fields(cycle = self.stats.cycles + 1))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let started = Instant::now();
        let result = self.cycle().await;

        match &result {
            Ok(report) => {
                self.stats.record(report, started.elapsed());
                observability::record_cycle(report.label(), started.elapsed());
            }
            Err(_) => observability::record_cycle("fatal", started.elapsed()),
        }
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport, EngineError> {
        // Fetching
        self.transition(PollerState::Fetching);
        let entities = match self.fetch().await {
            Ok(entities) => entities,
            Err(e) => {
                let retry_in = self.backoff.next_delay();
                observability::record_fetch_failure();
                observability::record_backoff(retry_in);
                warn!(
                    error = %e,
                    failures = self.backoff.failures(),
                    retry_in_secs = retry_in.as_secs_f64(),
                    "Fetch failed, backing off"
                );
                self.transition(PollerState::Backoff);
                return Ok(CycleReport::FetchFailed {
                    retry_in,
                    reason: e.to_string(),
                });
            }
        };
        if self.backoff.failures() > 0 {
            info!(failures = self.backoff.failures(), "Upstream recovered");
            observability::record_backoff(Duration::ZERO);
        }
        self.backoff.reset();

        // Deduplicating
        self.transition(PollerState::Deduplicating);
        let fetched = entities.len();
        let previous = self.previous_snapshot().await?;
        let DedupOutcome {
            new_events,
            next,
            first_run,
            suppressed,
        } = self.dedup.deduplicate(entities, previous.as_ref());
        observability::record_new_entities(new_events.len());
        debug!(fetched, new = new_events.len(), first_run, suppressed, "Deduplicated");
        if suppressed > 0 {
            info!(suppressed, "First run: recording entities without notifying");
        }

        // Dispatching
        self.transition(PollerState::Dispatching);
        let report = self.dispatcher.dispatch(&new_events).await;
        for record in report.records() {
            observability::record_delivery(record);
        }
        let failures = report.failures();

        if !report.should_commit(self.config.commit_policy) {
            warn!(
                new = new_events.len(),
                failures,
                policy = ?self.config.commit_policy,
                "Commit held back by policy, entities will be offered again"
            );
            self.transition(PollerState::Idle);
            return Ok(CycleReport::Held {
                new_events: new_events.len(),
                failures,
            });
        }

        // Persisting
        self.transition(PollerState::Persisting);
        self.persist(&next).await?;
        observability::record_snapshot_size(next.len());
        info!(
            sequence = next.sequence,
            ids = next.len(),
            new = new_events.len(),
            failures,
            "Snapshot committed"
        );

        let sequence = next.sequence;
        self.committed = Some(Some(next));
        self.transition(PollerState::Idle);

        Ok(CycleReport::Committed {
            sequence,
            new_events: new_events.len(),
            suppressed,
            failures,
        })
    }

    async fn fetch(&mut self) -> Result<Vec<contracts::Entity>, ContractError> {
        let limit = self.config.fetch_timeout();
        match timeout(limit, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ContractError::fetch_unavailable(format!(
                "fetch timed out after {}s",
                limit.as_secs_f64()
            ))),
        }
    }

    /// Last committed snapshot, read from the store on first use
    async fn previous_snapshot(&mut self) -> Result<Option<Snapshot>, EngineError> {
        if let Some(committed) = &self.committed {
            return Ok(committed.clone());
        }
        let store = &self.store;
        let loaded = with_store_retries(
            store.backend(),
            "load",
            &self.config,
            &mut self.stats.store_retries,
            || store.load(),
        )
        .await?;
        match &loaded {
            Some(snapshot) => info!(
                sequence = snapshot.sequence,
                ids = snapshot.len(),
                "Snapshot loaded"
            ),
            None => info!("No snapshot stored yet, this is the first run"),
        }
        self.committed = Some(loaded.clone());
        Ok(loaded)
    }

    /// Save `snapshot`, retrying the same snapshot; never re-dispatches
    async fn persist(&mut self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let store = &self.store;
        with_store_retries(
            store.backend(),
            "save",
            &self.config,
            &mut self.stats.store_retries,
            || store.save(snapshot),
        )
        .await
    }

    fn transition(&self, state: PollerState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "State transition");
        }
    }

    /// Stop the sink workers and hand back the statistics
    ///
    /// For callers that drive `run_cycle` themselves.
    pub async fn close(self) -> PollerStats {
        self.transition(PollerState::Stopped);
        let Self {
            dispatcher,
            mut stats,
            ..
        } = self;
        stats.sinks = dispatcher.metrics();
        dispatcher.shutdown().await;
        stats
    }

    /// Spawn the loop on the runtime
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown: shutdown_tx,
            state,
            task: Some(task),
        }
    }

    /// Cycle until `shutdown` turns true or a fatal error occurs
    #[instrument(name = "poller_run", skip_all)]
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PollerStats, EngineError> {
        info!(
            source = self.source.name(),
            backend = self.store.backend(),
            sinks = ?self.dispatcher.sink_names(),
            interval_secs = self.config.interval_secs,
            "Poller started"
        );

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let wait = match self.run_cycle().await {
                Ok(CycleReport::FetchFailed { retry_in, .. }) => retry_in,
                Ok(_) => self.config.interval(),
                Err(e) => {
                    error!(error = %e, "Poller stopping on fatal error");
                    break Err(e);
                }
            };

            tokio::select! {
                _ = sleep(wait) => self.transition(PollerState::Idle),
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Handle dropped without stop(): treat as shutdown
                        break Ok(());
                    }
                }
            }
        };

        let stats = self.close().await;

        match outcome {
            Ok(()) => {
                info!(cycles = stats.cycles, "Poller stopped");
                Ok(stats)
            }
            Err(e) => Err(e),
        }
    }
}

/// Run a store operation, retrying `StorageUnavailable` up to the budget
async fn with_store_retries<R, F, Fut>(
    backend: &str,
    operation: &'static str,
    config: &PollerConfig,
    retries: &mut u64,
    mut op: F,
) -> Result<R, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, ContractError>>,
{
    let max_attempts = config.save_max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_storage() => return Err(e.into()),
            Err(e) if attempt >= max_attempts => {
                error!(
                    backend,
                    operation,
                    attempts = attempt,
                    error = %e,
                    "Store retries exhausted"
                );
                return Err(EngineError::StoreExhausted {
                    backend: backend.to_string(),
                    operation,
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                warn!(
                    backend,
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Store operation failed, retrying"
                );
                *retries += 1;
                observability::record_save_retry();
                sleep(config.save_retry_delay()).await;
            }
        }
    }
}

/// Handle to a poller running in the background
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<PollerState>,
    task: Option<JoinHandle<Result<PollerStats, EngineError>>>,
}

impl PollerHandle {
    /// Current state
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.clone()
    }

    /// Wait for the loop to end on its own (fatal error)
    ///
    /// Cancel-safe: if this future is dropped the poller keeps running and
    /// `stop` can still be called.
    pub async fn wait(&mut self) -> Result<PollerStats, EngineError> {
        match self.task.as_mut() {
            Some(task) => {
                let result = join(task).await;
                self.task = None;
                result
            }
            None => Err(EngineError::TaskFailed("poller already finished".into())),
        }
    }

    /// Signal shutdown and wait for the current cycle to finish
    #[instrument(name = "poller_handle_stop", skip(self))]
    pub async fn stop(mut self) -> Result<PollerStats, EngineError> {
        // Receiver gone means the loop already ended
        let _ = self.shutdown.send(true);
        match self.task.take() {
            Some(mut task) => join(&mut task).await,
            None => Err(EngineError::TaskFailed("poller already finished".into())),
        }
    }
}

async fn join(
    task: &mut JoinHandle<Result<PollerStats, EngineError>>,
) -> Result<PollerStats, EngineError> {
    task.await
        .map_err(|e| EngineError::TaskFailed(e.to_string()))?
}
