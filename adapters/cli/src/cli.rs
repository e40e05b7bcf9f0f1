//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Merge Six - drag numbered tiles together until they reach six.
#[derive(Parser, Debug)]
#[command(name = "merge-six")]
#[command(about = "Headless Merge Six engine with a greedy autoplayer", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Resume or start a session and let the autoplayer drag tiles.
    Play {
        #[command(flatten)]
        common: CommonArgs,

        /// Seed overriding the configured one.
        #[arg(long)]
        seed: Option<u64>,

        /// Board columns overriding the configured count.
        #[arg(long)]
        columns: Option<u32>,

        /// Board rows overriding the configured count.
        #[arg(long)]
        rows: Option<u32>,

        /// Number of drops the autoplayer attempts.
        #[arg(long, default_value = "40")]
        turns: u32,

        /// Start over instead of resuming the stored session.
        #[arg(long)]
        fresh: bool,

        /// Suppress the board printout after each drop.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the stored session snapshot.
    Inspect {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Delete the stored session snapshot.
    Reset {
        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Arguments shared by every command.
#[derive(Args, Debug)]
pub(crate) struct CommonArgs {
    /// Path to a TOML session configuration.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Directory holding saved sessions.
    #[arg(long, default_value = ".merge-six")]
    pub(crate) save_dir: PathBuf,
}
