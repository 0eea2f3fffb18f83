//! `info` command implementation.
//!
//! Shows the effective configuration together with what the state store
//! currently remembers.

use anyhow::{Context, Result};
use contracts::{Snapshot, StateStore, WatcherBlueprint};
use serde::Serialize;
use state_store::ConfiguredStore;
use tracing::info;

use super::{load_blueprint, store_location};
use crate::cli::InfoArgs;

#[derive(Serialize)]
struct WatcherInfo {
    source_url: String,
    interval_secs: u64,
    store: StoreInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct StoreInfo {
    backend: &'static str,
    location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<SnapshotInfo>,
}

#[derive(Serialize)]
struct SnapshotInfo {
    sequence: u64,
    id_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disabled_kinds: Vec<String>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Loading watcher info");

    let blueprint = load_blueprint(&args.config)?;
    let store = ConfiguredStore::open(&blueprint.store)
        .await
        .context("Failed to open state store")?;
    let snapshot = store.load().await.context("Failed to load snapshot")?;

    let info = build_info(&blueprint, snapshot.as_ref(), args.ids);

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize info")?;
        println!("{}", json);
    } else {
        print_info(&info);
    }

    Ok(())
}

fn build_info(blueprint: &WatcherBlueprint, snapshot: Option<&Snapshot>, ids: bool) -> WatcherInfo {
    WatcherInfo {
        source_url: blueprint.source.url.clone(),
        interval_secs: blueprint.poller.interval_secs,
        store: StoreInfo {
            backend: blueprint.store.backend(),
            location: store_location(&blueprint.store),
            snapshot: snapshot.map(|s| SnapshotInfo {
                sequence: s.sequence,
                id_count: s.len(),
                ids: ids.then(|| s.ids.iter().cloned().collect()),
            }),
        },
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                disabled_kinds: s.disabled_kinds.clone(),
            })
            .collect(),
    }
}

fn print_info(info: &WatcherInfo) {
    println!("Source: {}", info.source_url);
    println!("Interval: {}s", info.interval_secs);

    println!("\nStore");
    println!("   ├─ Backend: {}", info.store.backend);
    println!("   ├─ Location: {}", info.store.location);
    match &info.store.snapshot {
        Some(snapshot) => {
            println!("   ├─ Sequence: {}", snapshot.sequence);
            println!("   └─ Known ids: {}", snapshot.id_count);
            if let Some(ids) = &snapshot.ids {
                for id in ids {
                    println!("        {}", id);
                }
            }
        }
        None => println!("   └─ Snapshot: none (next cycle is a first run)"),
    }

    if !info.sinks.is_empty() {
        println!("\nSinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            if sink.disabled_kinds.is_empty() {
                println!("   {} {} ({})", prefix, sink.name, sink.sink_type);
            } else {
                println!(
                    "   {} {} ({}), ignores {}",
                    prefix,
                    sink.name,
                    sink.sink_type,
                    sink.disabled_kinds.join(", ")
                );
            }
        }
    }

    println!();
}
