//! Configuration validation
//!
//! Rules:
//! - poll interval, timeouts and store attempts > 0
//! - backoff_initial <= backoff_max, multiplier >= 1
//! - source url and store location present, database uri is sqlite
//! - sink names unique and non-empty, type-specific params present

use std::collections::HashSet;

use contracts::{ContractError, SinkType, StoreConfig, WatcherBlueprint};

/// Validate a WatcherBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &WatcherBlueprint) -> Result<(), ContractError> {
    validate_poller(blueprint)?;
    validate_source(blueprint)?;
    validate_store(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_poller(blueprint: &WatcherBlueprint) -> Result<(), ContractError> {
    let poller = &blueprint.poller;

    let positive = [
        ("poller.interval_secs", poller.interval_secs),
        ("poller.fetch_timeout_secs", poller.fetch_timeout_secs),
        ("poller.delivery_timeout_secs", poller.delivery_timeout_secs),
        ("poller.backoff_initial_secs", poller.backoff_initial_secs),
        ("poller.save_max_attempts", u64::from(poller.save_max_attempts)),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ContractError::config_invalid(field, "must be > 0"));
        }
    }

    if poller.backoff_initial_secs > poller.backoff_max_secs {
        return Err(ContractError::config_invalid(
            "poller.backoff_initial_secs / poller.backoff_max_secs",
            format!(
                "backoff_initial_secs ({}) must be <= backoff_max_secs ({})",
                poller.backoff_initial_secs, poller.backoff_max_secs
            ),
        ));
    }

    if !(poller.backoff_multiplier >= 1.0 && poller.backoff_multiplier.is_finite()) {
        return Err(ContractError::config_invalid(
            "poller.backoff_multiplier",
            format!(
                "backoff_multiplier must be >= 1, got {}",
                poller.backoff_multiplier
            ),
        ));
    }

    Ok(())
}

fn validate_source(blueprint: &WatcherBlueprint) -> Result<(), ContractError> {
    if blueprint.source.url.trim().is_empty() {
        return Err(ContractError::config_invalid(
            "source.url",
            "source url cannot be empty",
        ));
    }
    Ok(())
}

fn validate_store(blueprint: &WatcherBlueprint) -> Result<(), ContractError> {
    match &blueprint.store {
        StoreConfig::File { path } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_invalid(
                    "store.path",
                    "file backend requires a path",
                ));
            }
        }
        StoreConfig::Database { uri, key } => {
            if uri.trim().is_empty() {
                return Err(ContractError::config_invalid(
                    "store.uri",
                    "database backend requires a uri",
                ));
            }
            if !uri.starts_with("sqlite:") {
                return Err(ContractError::config_invalid(
                    "store.uri",
                    format!("unsupported database uri '{uri}', expected sqlite:"),
                ));
            }
            if key.trim().is_empty() {
                return Err(ContractError::config_invalid(
                    "store.key",
                    "database backend requires a non-empty key",
                ));
            }
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &WatcherBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_invalid(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_invalid(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        match sink.sink_type {
            SinkType::Log => {}
            SinkType::File => {
                if sink.params.get("path").is_none_or(|p| p.is_empty()) {
                    return Err(ContractError::config_invalid(
                        format!("sinks[{}].params.path", sink.name),
                        "file sink requires a 'path' parameter",
                    ));
                }
            }
            SinkType::Webhook => {
                let url = sink.params.get("url").map(String::as_str).unwrap_or("");
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ContractError::config_invalid(
                        format!("sinks[{}].params.url", sink.name),
                        format!("webhook sink requires an http(s) 'url', got '{url}'"),
                    ));
                }
            }
        }
    }
    Ok(())
}
