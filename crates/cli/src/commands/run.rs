//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::WatcherBlueprint;
use engine::{Poller, PollerStats};
use sources::HttpFeedSource;
use state_store::ConfiguredStore;
use tracing::{error, info, warn};

use super::{load_blueprint, store_location};
use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_watcher(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config)?;

    info!(
        source = %blueprint.source.url,
        backend = blueprint.store.backend(),
        sinks = blueprint.sinks.len(),
        interval_secs = blueprint.poller.interval_secs,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let poller_config = blueprint.poller.clone();

    let source = HttpFeedSource::new(&blueprint.source, poller_config.fetch_timeout())
        .context("Failed to create event source")?;
    let store = ConfiguredStore::open(&blueprint.store)
        .await
        .context("Failed to open state store")?;
    let dispatcher =
        dispatcher::create_dispatcher(blueprint.sinks.clone(), poller_config.delivery_timeout())
            .await
            .context("Failed to create notification sinks")?;

    let mut poller = Poller::new(source, store, dispatcher, poller_config);

    if args.once {
        info!("Running a single cycle");
        let result = poller.run_cycle().await;
        let stats = poller.close().await;
        let report = result.context("Poll cycle failed")?;
        info!(outcome = report.label(), "Single cycle finished");
        print_stats(&stats);
        return Ok(());
    }

    let mut handle = poller.start();
    let shutdown_signal = setup_shutdown_signal();

    info!("Watching for new stargazers...");

    // None: a shutdown signal arrived while the poller was still running
    let finished = tokio::select! {
        result = handle.wait() => Some(result),
        _ = shutdown_signal => None,
    };

    let stats = match finished {
        Some(result) => result.context("Poller execution failed")?,
        None => {
            warn!("Received shutdown signal, finishing current cycle...");
            handle.stop().await.context("Poller did not stop cleanly")?
        }
    };

    info!(
        cycles = stats.cycles,
        committed = stats.committed,
        new_events = stats.new_events,
        "Watcher finished"
    );
    print_stats(&stats);

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves, so the other one
/// (or a fatal poller error) still ends the run.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_stats(stats: &PollerStats) {
    println!("\n{stats}");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &WatcherBlueprint) {
    let poller = &blueprint.poller;

    println!("\n=== Configuration Summary ===\n");
    println!("Source:");
    println!("  URL: {}", blueprint.source.url);
    println!(
        "  Auth: {}",
        if blueprint.source.bearer_token.is_some() {
            "bearer token"
        } else {
            "none"
        }
    );
    println!("\nStore:");
    println!("  Backend: {}", blueprint.store.backend());
    println!("  Location: {}", store_location(&blueprint.store));
    println!("\nPoller:");
    println!("  Interval: {}s", poller.interval_secs);
    println!(
        "  Backoff: {}s -> {}s (x{})",
        poller.backoff_initial_secs, poller.backoff_max_secs, poller.backoff_multiplier
    );
    println!("  Commit policy: {:?}", poller.commit_policy);
    println!("  Suppress first run: {}", poller.suppress_first_run);
    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        if sink.disabled_kinds.is_empty() {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        } else {
            println!(
                "  - {} ({:?}), ignores: {}",
                sink.name,
                sink.sink_type,
                sink.disabled_kinds.join(", ")
            );
        }
    }
    println!();
}
