//! `reset` command implementation.

use anyhow::{Context, Result};
use contracts::StateStore;
use state_store::ConfiguredStore;
use tracing::{info, warn};

use super::{load_blueprint, store_location};
use crate::cli::ResetArgs;

/// Execute the `reset` command
///
/// Deletes the stored snapshot, so the next cycle runs as a first run.
pub async fn run_reset(args: &ResetArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config)?;
    let location = store_location(&blueprint.store);

    if !args.yes {
        anyhow::bail!("Refusing to reset {location} without --yes");
    }

    let store = ConfiguredStore::open(&blueprint.store)
        .await
        .context("Failed to open state store")?;
    // Read first only to report what is being deleted
    let previous = store.load().await;

    store.reset().await.context("Failed to reset state store")?;

    match previous {
        Ok(Some(snapshot)) => warn!(
            location = %location,
            sequence = snapshot.sequence,
            ids = snapshot.len(),
            "Snapshot deleted"
        ),
        Ok(None) => info!(location = %location, "No snapshot stored, nothing to delete"),
        Err(e) => warn!(
            location = %location,
            error = %e,
            "Unreadable snapshot deleted"
        ),
    }
    println!("Reset {} store at {}", blueprint.store.backend(), location);

    Ok(())
}
