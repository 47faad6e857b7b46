//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "antctl", version, about = "Antenna-control board CLI")]
pub struct Cli {
    /// Path to config TOML; board defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive console: regulation runs in the background while
    /// line-oriented commands are read from stdin
    Console {
        /// Do not start the background regulation/indicator thread
        #[arg(long, action = ArgAction::SetTrue)]
        no_scheduler: bool,
    },
    /// Print the resolved stage table and field groups
    Wiring {
        /// Apply the suspected FM/AT/SS swaps regardless of the config
        #[arg(long, action = ArgAction::SetTrue)]
        swaps: bool,
    },
    /// Quick health check: resolve wiring and verify the chain by readback
    SelfCheck,
}
