//! # Integration Tests
//!
//! End-to-end tests wiring real crates together: a scripted source, the
//! poller, the dispatcher with recording or file sinks, and each state store
//! backend. No network access is needed.

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use contracts::{ContractError, Entity, NotificationSink, PollerConfig};
    use dispatcher::{Dispatcher, SinkHandle};

    /// Sink that remembers every delivered id and optionally always fails
    pub struct RecordingSink {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingSink {
        pub fn new(name: &str, fail: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Self {
                name: name.to_string(),
                seen: Arc::clone(&seen),
                fail,
            };
            (sink, seen)
        }
    }

    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&mut self, entity: &Entity) -> Result<(), ContractError> {
            self.seen.lock().unwrap().push(entity.id.clone());
            if self.fail {
                Err(ContractError::sink_delivery(
                    &self.name,
                    &entity.id,
                    "endpoint rejected",
                ))
            } else {
                Ok(())
            }
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    pub type Seen = Arc<Mutex<Vec<String>>>;

    /// Dispatcher over recording sinks, one per `(name, fail)` pair
    pub fn recording_dispatcher(sinks: &[(&str, bool)]) -> (Dispatcher, Vec<Seen>) {
        let mut handles = Vec::new();
        let mut seen = Vec::new();
        for (name, fail) in sinks {
            let (sink, log) = RecordingSink::new(name, *fail);
            handles.push(SinkHandle::spawn(sink, Vec::new(), Duration::from_secs(1)));
            seen.push(log);
        }
        (Dispatcher::with_handles(handles), seen)
    }

    pub fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    pub fn entities(ids: &[&str]) -> Vec<Entity> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Entity::new(*id, at(i as u32)).with_kind("star"))
            .collect()
    }

    pub fn fast_config() -> PollerConfig {
        PollerConfig {
            interval_secs: 1,
            backoff_initial_secs: 1,
            backoff_max_secs: 3,
            backoff_multiplier: 2.0,
            save_max_attempts: 3,
            save_retry_delay_ms: 1,
            ..PollerConfig::default()
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeSet;

    use contracts::Snapshot;
    use engine::{CycleReport, Poller};
    use sources::MockEventSource;
    use state_store::MemoryStateStore;

    use crate::support::{entities, fast_config, recording_dispatcher};

    fn ids(snapshot: &Snapshot) -> BTreeSet<&str> {
        snapshot.ids.iter().map(String::as_str).collect()
    }

    /// Empty store, first-run suppression on:
    /// 1. first fetch {u1, u2} is recorded without notifying anyone
    /// 2. second fetch {u1, u2, u3} notifies exactly u3 on every sink
    #[tokio::test]
    async fn test_first_run_suppressed_then_only_new_entity_dispatched() {
        let source = MockEventSource::new()
            .then_entities(entities(&["u1", "u2"]))
            .then_entities(entities(&["u1", "u2", "u3"]));
        let store = MemoryStateStore::new();
        let (dispatcher, seen) = recording_dispatcher(&[("a", false), ("b", false)]);
        let config = contracts::PollerConfig {
            suppress_first_run: true,
            ..fast_config()
        };
        let mut poller = Poller::new(source, store.clone(), dispatcher, config);

        let first = poller.run_cycle().await.unwrap();
        assert_eq!(
            first,
            CycleReport::Committed {
                sequence: 1,
                new_events: 0,
                suppressed: 2,
                failures: 0
            }
        );
        assert!(seen.iter().all(|s| s.lock().unwrap().is_empty()));
        assert_eq!(ids(&store.current().unwrap()), BTreeSet::from(["u1", "u2"]));

        let second = poller.run_cycle().await.unwrap();
        assert_eq!(
            second,
            CycleReport::Committed {
                sequence: 2,
                new_events: 1,
                suppressed: 0,
                failures: 0
            }
        );
        for log in &seen {
            assert_eq!(*log.lock().unwrap(), vec!["u3"]);
        }
        assert_eq!(
            ids(&store.current().unwrap()),
            BTreeSet::from(["u1", "u2", "u3"])
        );

        let stats = poller.close().await;
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.suppressed, 2);
        assert_eq!(stats.new_events, 1);
    }

    /// Sink A always succeeds, sink B always fails: the snapshot still moves
    #[tokio::test]
    async fn test_partial_sink_failure_still_persists() {
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2", "u3"]));
        let store = MemoryStateStore::new();
        let (dispatcher, seen) = recording_dispatcher(&[("a", false), ("b", true)]);
        let mut poller = Poller::new(source, store.clone(), dispatcher, fast_config());

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(
            report,
            CycleReport::Committed {
                sequence: 1,
                new_events: 3,
                suppressed: 0,
                failures: 3
            }
        );
        assert_eq!(*seen[0].lock().unwrap(), vec!["u1", "u2", "u3"]);
        assert_eq!(seen[1].lock().unwrap().len(), 3);
        assert_eq!(store.current().unwrap().len(), 3);

        let stats = poller.close().await;
        assert_eq!(stats.delivery_failures, 3);
    }

    /// Same two sinks with `any_success`: every entity reached sink A
    #[tokio::test]
    async fn test_any_success_policy_commits_when_one_sink_delivers() {
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2"]));
        let store = MemoryStateStore::new();
        let (dispatcher, _) = recording_dispatcher(&[("a", false), ("b", true)]);
        let config = contracts::PollerConfig {
            commit_policy: contracts::CommitPolicy::AnySuccess,
            ..fast_config()
        };
        let mut poller = Poller::new(source, store.clone(), dispatcher, config);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.label(), "committed");
        assert_eq!(store.current().unwrap().sequence, 1);
    }

    /// Under `all_success` a failing sink holds the commit and the same
    /// entities are offered again on the next cycle
    #[tokio::test]
    async fn test_held_commit_redelivers_next_cycle() {
        let source = MockEventSource::new().then_entities(entities(&["u1"]));
        let store = MemoryStateStore::new();
        let (dispatcher, seen) = recording_dispatcher(&[("a", false), ("b", true)]);
        let config = contracts::PollerConfig {
            commit_policy: contracts::CommitPolicy::AllSuccess,
            ..fast_config()
        };
        let mut poller = Poller::new(source, store.clone(), dispatcher, config);

        for _ in 0..2 {
            let report = poller.run_cycle().await.unwrap();
            assert_eq!(
                report,
                CycleReport::Held {
                    new_events: 1,
                    failures: 1
                }
            );
        }
        assert_eq!(*seen[0].lock().unwrap(), vec!["u1", "u1"]);
        assert_eq!(store.current(), None);
        assert_eq!(store.save_calls(), 0);
    }

    /// Save fails after dispatch: the retry reuses the snapshot and never
    /// notifies again; exhausting the budget stops the poller
    #[tokio::test]
    async fn test_save_failure_after_dispatch_does_not_redeliver() {
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2"]));
        let store = MemoryStateStore::new();
        store.fail_next_saves(2);
        let (dispatcher, seen) = recording_dispatcher(&[("a", false)]);
        let mut poller = Poller::new(source, store.clone(), dispatcher, fast_config());

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.label(), "committed");
        assert_eq!(*seen[0].lock().unwrap(), vec!["u1", "u2"]);
        assert_eq!(store.save_calls(), 3);
        assert_eq!(store.history().len(), 1);

        let fresh = MemoryStateStore::new();
        fresh.fail_next_saves(u32::MAX);
        let source = MockEventSource::new().then_entities(entities(&["u9"]));
        let (dispatcher, seen) = recording_dispatcher(&[("a", false)]);
        let mut poller = Poller::new(source, fresh.clone(), dispatcher, fast_config());

        let err = poller.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            engine::EngineError::StoreExhausted {
                operation: "save",
                attempts: 3,
                ..
            }
        ));
        assert_eq!(*seen[0].lock().unwrap(), vec!["u9"]);
        assert_eq!(fresh.current(), None);
    }

    /// Three consecutive fetch failures: strictly increasing waits capped
    /// at the configured maximum, snapshot untouched throughout
    #[tokio::test]
    async fn test_backoff_grows_and_snapshot_is_unchanged() {
        let source = MockEventSource::new()
            .then_unavailable("503")
            .then_unavailable("503")
            .then_unavailable("503")
            .then_entities(entities(&["u7"]));
        let before = Snapshot::from((5, ["u1", "u2"]));
        let store = MemoryStateStore::with_snapshot(before.clone());
        let (dispatcher, seen) = recording_dispatcher(&[("a", false)]);
        let mut poller = Poller::new(source, store.clone(), dispatcher, fast_config());

        let mut waits = Vec::new();
        for _ in 0..3 {
            match poller.run_cycle().await.unwrap() {
                CycleReport::FetchFailed { retry_in, .. } => waits.push(retry_in.as_secs()),
                other => panic!("expected fetch failure, got {other:?}"),
            }
            assert_eq!(store.current(), Some(before.clone()));
        }
        assert_eq!(waits, vec![1, 2, 3]);
        assert!(waits.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.save_calls(), 0);

        // Recovery resets the schedule and continues from the old snapshot
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(
            report,
            CycleReport::Committed {
                sequence: 6,
                new_events: 1,
                suppressed: 0,
                failures: 0
            }
        );
        assert_eq!(*seen[0].lock().unwrap(), vec!["u7"]);

        let stats = poller.close().await;
        assert_eq!(stats.fetch_failures, 3);
    }
}

#[cfg(test)]
mod backend_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{SinkConfig, SinkType, StateStore};
    use engine::{Poller, PollerState};
    use sources::MockEventSource;
    use state_store::{ConfiguredStore, DatabaseStateStore, FileStateStore};

    use crate::support::{entities, fast_config, recording_dispatcher};

    /// Background loop on the file store; stop() finishes the cycle and
    /// leaves the state as Stopped
    #[tokio::test]
    async fn test_start_stop_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/snapshot.json");
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2"]));
        let (dispatcher, seen) = recording_dispatcher(&[("a", false)]);
        let poller = Poller::new(
            source,
            FileStateStore::new(&path),
            dispatcher,
            fast_config(),
        );

        let handle = poller.start();
        let mut state = handle.subscribe();

        let reader = FileStateStore::new(&path);
        tokio::time::timeout(Duration::from_secs(5), async {
            while reader.load().await.ok().flatten().is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first cycle should commit");

        let stats = handle.stop().await.unwrap();
        assert!(stats.cycles >= 1);
        assert_eq!(*state.borrow_and_update(), PollerState::Stopped);
        assert_eq!(*seen[0].lock().unwrap(), vec!["u1", "u2"]);

        let stored = reader.load().await.unwrap().unwrap();
        assert_eq!(stored.len(), 2);
    }

    /// A restarted watcher on the same database does not notify again
    #[tokio::test]
    async fn test_database_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("sqlite://{}", dir.path().join("stargazer.db").display());

        let store = DatabaseStateStore::connect(&uri, "stargazer_snapshot")
            .await
            .unwrap();
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2"]));
        let (dispatcher, first_seen) = recording_dispatcher(&[("a", false)]);
        let mut poller = Poller::new(source, store, dispatcher, fast_config());
        poller.run_cycle().await.unwrap();
        poller.store().close().await;
        poller.close().await;
        assert_eq!(first_seen[0].lock().unwrap().len(), 2);

        let store = DatabaseStateStore::connect(&uri, "stargazer_snapshot")
            .await
            .unwrap();
        let source = MockEventSource::new().then_entities(entities(&["u1", "u2", "u3"]));
        let (dispatcher, second_seen) = recording_dispatcher(&[("a", false)]);
        let mut poller = Poller::new(source, store, dispatcher, fast_config());
        poller.run_cycle().await.unwrap();

        assert_eq!(*second_seen[0].lock().unwrap(), vec!["u3"]);
        let snapshot = poller.store().load().await.unwrap().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.len(), 3);
    }

    /// Configuration file -> store + file sink -> JSON lines on disk
    #[tokio::test]
    async fn test_configured_pipeline_writes_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.db");
        let out = dir.path().join("out/notifications.jsonl");
        let content = format!(
            r#"
[poller]
commit_policy = "all_success"

[source]
url = "https://example.org/stars.json"

[store]
backend = "database"
uri = "sqlite://{}"

[[sinks]]
name = "archive"
sink_type = "file"
disabled_kinds = ["fork"]

[sinks.params]
path = "{}"
"#,
            db.display(),
            out.display()
        );
        let blueprint = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let store = ConfiguredStore::open(&blueprint.store).await.unwrap();
        assert_eq!(store.backend(), "database");
        let dispatcher = dispatcher::create_dispatcher(
            blueprint.sinks.clone(),
            blueprint.poller.delivery_timeout(),
        )
        .await
        .unwrap();

        let mut events = entities(&["u1", "u2"]);
        events.push(contracts::Entity::new("f1", crate::support::at(30)).with_kind("fork"));
        let source = MockEventSource::new().then_entities(events);
        let mut poller = Poller::new(source, store, dispatcher, blueprint.poller.clone());

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.label(), "committed");
        poller.close().await;

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "u1");
        assert_eq!(lines[1]["id"], "u2");
    }

    /// A file sink without a path is rejected before any worker starts
    #[tokio::test]
    async fn test_dispatcher_rejects_file_sink_without_path() {
        let sinks = vec![SinkConfig {
            name: "broken".into(),
            sink_type: SinkType::File,
            disabled_kinds: Vec::new(),
            params: HashMap::new(),
        }];
        let result = dispatcher::create_dispatcher(sinks, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
