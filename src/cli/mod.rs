//! Command-line interface definitions.

pub mod check;
pub mod run;
pub mod stage;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tickwarden - market tick ingestion with supervised feed producers.
#[derive(Parser, Debug)]
#[command(name = "tickwarden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the feed service (foreground)
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),

    /// Show the trading day and session stage of an instant
    Stage(StageArgs),
}

/// Subcommands for `tickwarden check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration file
    Config(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}

/// Arguments for the `stage` subcommand.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Instrument id, e.g. SHFE.ru1901 or ru1901
    pub instrument: String,

    /// Local exchange time: "YYYY-MM-DD HH:MM[:SS]"
    pub datetime: String,

    /// Configuration file supplying holidays and the instrument master list
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
