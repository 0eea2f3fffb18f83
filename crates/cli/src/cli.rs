//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// stargazer - watch an upstream feed and notify about new entities
#[derive(Parser, Debug)]
#[command(
    name = "stargazer",
    author,
    version,
    about = "Watch an upstream feed and notify sinks about new entities",
    long_about = "Polls an upstream event source on a fixed interval, remembers every \n\
                  entity id it has seen in a file or database snapshot, and sends each \n\
                  newly observed entity to the configured notification sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STARGAZER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "STARGAZER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the poll loop until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Show configuration and the stored snapshot
    Info(InfoArgs),

    /// Delete the stored snapshot (next run is a first run)
    Reset(ResetArgs),
}

/// Configuration file plus the values that may be overridden per invocation
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "stargazer.toml",
        env = "STARGAZER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the upstream feed URL
    #[arg(long, env = "STARGAZER_SOURCE_URL")]
    pub source_url: Option<String>,

    /// Use a file store at this path instead of the configured store
    #[arg(long, env = "STARGAZER_STORE_PATH")]
    pub store_path: Option<PathBuf>,
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Validate configuration and exit without polling
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STARGAZER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every stored entity id
    #[arg(long)]
    pub ids: bool,
}

/// Arguments for the `reset` command
#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Confirm deleting the stored snapshot
    #[arg(long)]
    pub yes: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
