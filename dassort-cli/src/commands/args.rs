//! Options shared by `watch` and `poll`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use dassort_core::RunDefaults;
use dassort_daemon::SchedulerConfig;
use dassort_sync::PollOptions;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory to watch for new groups [default: current directory].
    #[arg(short, long, env = "DASSORT_SOURCE")]
    pub source: Option<PathBuf>,

    /// Directory holding the YAML profiles [default: the source directory].
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Destination root for profiles that set none [default: ./tmp].
    #[arg(short, long, env = "DASSORT_DESTINATION")]
    pub destination: Option<String>,

    /// Base wait between polls, in seconds.
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub wait_time: u64,

    /// Longest wait between polls while idle, in seconds.
    #[arg(short, long, default_value_t = 600)]
    pub max_time: u64,

    /// Gap between the two size samples of a group, in seconds.
    #[arg(long, default_value_t = 10)]
    pub settle_time: u64,

    /// Limit for a single ssh/scp/command call, in seconds.
    #[arg(long, default_value_t = 3600)]
    pub transfer_timeout: u64,

    /// Log what would happen without transferring, deleting or issuing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Copy protocol for profiles that set none (scp, nocopy).
    #[arg(short = 'p', long, default_value = "scp")]
    pub copy_protocol: String,

    /// Delete each local file once it has been transferred.
    #[arg(long)]
    pub delete: bool,

    /// Remote host receiving the files.
    #[arg(short = 'r', long, env = "DASSORT_HOST")]
    pub remote_host: Option<String>,

    /// Host that follow-up commands are sent to [default: the remote host].
    #[arg(short = 'c', long, env = "DASSORT_CMDHOST")]
    pub cmd_host: Option<String>,

    /// User for ssh and scp.
    #[arg(short = 'u', long, env = "DASSORT_USER")]
    pub remote_user: Option<String>,
}

impl RunArgs {
    pub fn source_dir(&self) -> Result<PathBuf> {
        match &self.source {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("could not determine current directory"),
        }
    }

    pub fn config_dir(&self) -> Result<PathBuf> {
        match &self.config_dir {
            Some(dir) => Ok(dir.clone()),
            None => self.source_dir(),
        }
    }

    pub fn defaults(&self) -> Result<RunDefaults> {
        let destination = match &self.destination {
            Some(d) => d.clone(),
            None => std::env::current_dir()
                .context("could not determine current directory")?
                .join("tmp")
                .display()
                .to_string(),
        };
        Ok(RunDefaults {
            destination,
            user: self.remote_user.clone(),
            host: self.remote_host.clone(),
            cmd_host: self.cmd_host.clone(),
            copy_protocol: self.copy_protocol.clone(),
        })
    }

    pub fn poll_options(&self) -> Result<PollOptions> {
        Ok(PollOptions {
            source: self.source_dir()?,
            settle: Duration::from_secs(self.settle_time),
            dry_run: self.dry_run,
            delete: self.delete,
        })
    }

    pub fn schedule(&self) -> SchedulerConfig {
        SchedulerConfig {
            wait: Duration::from_secs(self.wait_time),
            max_wait: Duration::from_secs(self.max_time),
        }
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout)
    }

    /// Load the configuration and build a poller.
    pub fn poller(&self) -> Result<dassort_sync::Poller> {
        let config_dir = self.config_dir()?;
        dassort_daemon::build_poller(
            &config_dir,
            &self.defaults()?,
            self.poll_options()?,
            self.transfer_timeout(),
        )
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))
    }
}
