//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Crank Sync - angle-synchronization engine driver
#[derive(Parser, Debug)]
#[command(
    name = "crank-sync",
    author,
    version,
    about = "Crank angle-synchronization engine driver",
    long_about = "Drives the crank angle-synchronization engine over a synthetic or recorded\n\
                  tooth-edge trace.\n\n\
                  Builds the engine from configuration, replays the trace through a simulated \n\
                  capture timer, answers host interrupts with a scripted host and fans link \n\
                  messages out to collaborator channels."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CRANK_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CRANK_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine over a trace
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display wheel geometry derived from the configuration
    Info(InfoArgs),

    /// Write the configured synthetic trace to a file
    Generate(GenerateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "engine.toml",
        env = "CRANK_SYNC_CONFIG"
    )]
    pub config: PathBuf,

    /// Recorded trace (.bin/.trace/.json) instead of the configured synthetic wheel
    #[arg(short, long, env = "CRANK_SYNC_TRACE")]
    pub trace: Option<PathBuf>,

    /// Override the number of synthetic wheel revolutions
    #[arg(long)]
    pub revolutions: Option<u32>,

    /// Maximum number of engine events to process (0 = unlimited)
    #[arg(long, default_value = "0", env = "CRANK_SYNC_MAX_EVENTS")]
    pub max_events: u64,

    /// Keep stepping on timeouts after the last edge until the engine stalls
    #[arg(long)]
    pub run_out: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CRANK_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "engine.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the configuration with every default filled in
    #[arg(long)]
    pub resolved: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "engine.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Tooth period used to show window bounds (TCR1 ticks)
    #[arg(long, default_value = "1000")]
    pub period: u32,
}

/// Arguments for the `generate` command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "engine.toml")]
    pub config: PathBuf,

    /// Output trace file; the extension selects binary or JSON
    #[arg(short, long)]
    pub out: PathBuf,

    /// Override the number of wheel revolutions
    #[arg(long)]
    pub revolutions: Option<u32>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
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
