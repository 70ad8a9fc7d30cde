//! `dassort poll`: one poll, then exit.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use dassort_sync::PollReport;

use super::args::RunArgs;

#[derive(Args, Debug)]
pub struct PollArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Emit the poll report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "group")]
    group: String,
    #[tabled(rename = "profile")]
    profile: String,
    #[tabled(rename = "destination")]
    destination: String,
    #[tabled(rename = "sent")]
    processed: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "commands")]
    commands: usize,
}

impl PollArgs {
    pub fn run(self) -> Result<()> {
        dassort_daemon::init_tracing();
        let poller = self.run.poller()?;
        let report = poller.poll().context("poll failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize poll report")?
            );
            return Ok(());
        }
        print_report(&report, self.run.dry_run);
        Ok(())
    }
}

fn print_report(report: &PollReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}poll at {} | {} group(s) seen | {} unstable | {} unrouted | {} failed",
        report.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        report.groups_seen,
        report.unstable,
        report.unrouted,
        report.failed_groups,
    );

    if report.groups.is_empty() {
        println!("Nothing dispatched.");
        return;
    }

    let rows: Vec<GroupRow> = report
        .groups
        .iter()
        .map(|g| GroupRow {
            group: g
                .group
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| g.group.display().to_string()),
            profile: g.profile.to_string(),
            destination: g.destination.clone(),
            processed: g.outcome.processed,
            failed: g.outcome.failed + g.outcome.skipped,
            commands: g.outcome.commands.len(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let summary = format!("{} file(s) processed", report.processed);
    if report.processed > 0 {
        println!("{prefix}✓ {}", summary.green());
    } else {
        println!("{prefix}{}", summary.bright_black());
    }
}
