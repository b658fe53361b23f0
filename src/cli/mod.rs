//! CLI interface for updown-hedge
//!
//! Provides subcommands for:
//! - `hedge`: Run the paired hedge over every account pair
//! - `watch`: Follow up/down rounds and log the live books
//! - `safe-address`: Print the Safe derived from a key
//! - `config`: Show the effective configuration

mod hedge;
mod safe_address;
mod watch;

pub use hedge::HedgeArgs;
pub use safe_address::SafeAddressArgs;
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Config file read when `--config` is not given, if present
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "updown-hedge")]
#[command(about = "Paired hedge execution and round streaming for Polymarket up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hedge strategy over all account pairs
    Hedge(HedgeArgs),
    /// Stream the current round's books
    Watch(WatchArgs),
    /// Print the Safe address owned by a key
    SafeAddress(SafeAddressArgs),
    /// Show effective configuration
    Config,
}
