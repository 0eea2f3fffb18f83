//! Command implementations.

mod info;
mod reset;
mod run;
mod validate;

pub use info::run_info;
pub use reset::run_reset;
pub use run::run_watcher;
pub use validate::run_validate;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{StoreConfig, WatcherBlueprint};
use tracing::info;

use crate::cli::ConfigArgs;

/// Load the configuration file, apply overrides and re-validate
pub(crate) fn load_blueprint(args: &ConfigArgs) -> Result<WatcherBlueprint> {
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if apply_overrides(&mut blueprint, args) {
        ConfigLoader::validate(&blueprint).context("Invalid configuration after overrides")?;
    }

    Ok(blueprint)
}

/// Returns whether anything was overridden
fn apply_overrides(blueprint: &mut WatcherBlueprint, args: &ConfigArgs) -> bool {
    let mut changed = false;

    if let Some(url) = &args.source_url {
        info!(url = %url, "Overriding source url from CLI");
        blueprint.source.url = url.clone();
        changed = true;
    }
    if let Some(path) = &args.store_path {
        info!(path = %path.display(), "Overriding store with file backend from CLI");
        blueprint.store = StoreConfig::File { path: path.clone() };
        changed = true;
    }

    changed
}

/// Human readable store location
pub(crate) fn store_location(store: &StoreConfig) -> String {
    match store {
        StoreConfig::File { path } => path.display().to_string(),
        StoreConfig::Database { uri, key } => format!("{uri} (key {key})"),
    }
}
