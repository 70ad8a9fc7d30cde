//! dassort: ship finished acquisition groups off a watched directory.
//!
//! # Usage
//!
//! ```text
//! dassort watch [-s <source>] [-d <destination>] [--delete] [--dry-run] ...
//! dassort poll  [--json] [run options]
//! dassort check [--json] [--config-dir <dir>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, poll::PollArgs, watch::WatchArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dassort",
    version,
    about = "Move completed data groups to remote storage, routed by their JSON descriptors",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the source directory until interrupted, backing off while idle.
    Watch(WatchArgs),

    /// Run a single poll and print what it did.
    Poll(PollArgs),

    /// Load and validate the configuration directory.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Poll(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
