//! `dassort watch`: poll until ctrl-c.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::args::RunArgs;

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        dassort_daemon::init_tracing();
        let poller = self.run.poller()?;
        if self.run.dry_run {
            eprintln!("{}", "dry run: nothing will be copied or deleted".yellow());
        }

        let summary = dassort_daemon::start_blocking(poller, self.run.schedule())
            .context("watch stopped on an unrecoverable error")?;
        println!(
            "✓ stopped after {} poll(s), {} file(s) processed",
            summary.polls, summary.processed
        );
        Ok(())
    }
}
