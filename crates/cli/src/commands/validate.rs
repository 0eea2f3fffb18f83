//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CommitPolicy, SinkType, WatcherBlueprint};
use serde::Serialize;
use tracing::info;

use super::{load_blueprint, store_location};
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_url: String,
    store_backend: &'static str,
    store_location: String,
    interval_secs: u64,
    commit_policy: CommitPolicy,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.config.display().to_string();

    match load_blueprint(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                source_url: blueprint.source.url.clone(),
                store_backend: blueprint.store.backend(),
                store_location: store_location(&blueprint.store),
                interval_secs: blueprint.poller.interval_secs,
                commit_policy: blueprint.poller.commit_policy,
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &WatcherBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - new entities are recorded but never notified".to_string());
    }

    if blueprint.poller.commit_policy == CommitPolicy::AllSuccess
        && blueprint
            .sinks
            .iter()
            .any(|s| s.sink_type == SinkType::Webhook)
    {
        warnings.push(
            "commit_policy all_success with a webhook sink - an unreachable endpoint holds every commit"
                .to_string(),
        );
    }

    if blueprint.poller.interval_secs < blueprint.poller.fetch_timeout_secs {
        warnings.push(format!(
            "poller.interval_secs ({}) is shorter than fetch_timeout_secs ({})",
            blueprint.poller.interval_secs, blueprint.poller.fetch_timeout_secs
        ));
    }

    if blueprint.source.url.starts_with("http://") && blueprint.source.bearer_token.is_some() {
        warnings.push("Bearer token is sent over plain http".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source: {}", summary.source_url);
            println!(
                "  Store: {} ({})",
                summary.store_backend, summary.store_location
            );
            println!("  Interval: {}s", summary.interval_secs);
            println!("  Commit policy: {:?}", summary.commit_policy);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
