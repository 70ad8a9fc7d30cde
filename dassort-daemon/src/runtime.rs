use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use dassort_core::{config, RunDefaults};
use dassort_sync::{PollOptions, Poller};

use crate::backoff::Backoff;
use crate::error::{io_err, DaemonError};

/// Base and maximum wait between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub wait: Duration,
    pub max_wait: Duration,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub polls: usize,
    pub processed: usize,
}

/// Load the config directory and build a poller from it.
pub fn build_poller(
    config_dir: &Path,
    defaults: &RunDefaults,
    options: PollOptions,
    transfer_timeout: Duration,
) -> Result<Poller, DaemonError> {
    let settings = config::load_dir(config_dir, defaults)?;
    tracing::info!(
        profiles = settings.profiles.len(),
        router = settings.router.is_some(),
        "loaded configuration from {}",
        config_dir.display()
    );
    Ok(Poller::new(settings, options, transfer_timeout)?)
}

/// Start the scheduler and block the current thread until it exits.
pub fn start_blocking(poller: Poller, schedule: SchedulerConfig) -> Result<RunSummary, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(poller, schedule))
}

/// Poll until ctrl-c.
pub async fn run(poller: Poller, schedule: SchedulerConfig) -> Result<RunSummary, DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, stopping after the current poll");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
                },
            }
        })
    };

    let result = run_until(Arc::new(poller), schedule, shutdown_tx.subscribe()).await;
    let _ = shutdown_tx.send(());
    match signal_handle.await {
        Ok(inner) => inner?,
        Err(err) => return Err(DaemonError::Runtime(format!("signal task join failure: {err}"))),
    }
    result
}

/// Poll until `shutdown_rx` fires (or its sender is dropped).
///
/// The shutdown signal is only observed between polls; a poll that has
/// started always runs to completion.
pub async fn run_until(
    poller: Arc<Poller>,
    schedule: SchedulerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<RunSummary, DaemonError> {
    let mut backoff = Backoff::new(schedule.wait, schedule.max_wait);
    let mut summary = RunSummary::default();

    tracing::info!(
        source = %poller.options().source.display(),
        dry_run = poller.options().dry_run,
        delete = poller.options().delete,
        "watching for new groups"
    );

    loop {
        let worker = poller.clone();
        let result = tokio::task::spawn_blocking(move || worker.poll())
            .await
            .map_err(|err| DaemonError::Runtime(format!("poll task join error: {err}")))?;
        summary.polls += 1;

        let processed = match result {
            Ok(report) => {
                if report.processed > 0 || report.failed_groups > 0 {
                    tracing::info!(
                        processed = report.processed,
                        groups = report.groups.len(),
                        unstable = report.unstable,
                        unrouted = report.unrouted,
                        failed = report.failed_groups,
                        "poll finished"
                    );
                }
                report.processed
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "stopping");
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(error = %err, "poll failed; retrying later");
                0
            }
        };
        summary.processed += processed;

        let wait = backoff.advance(processed);
        tracing::debug!(wait_secs = wait.as_secs_f64(), "next poll scheduled");

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    tracing::info!(polls = summary.polls, processed = summary.processed, "stopped");
    Ok(summary)
}

/// Install the fmt subscriber once, writing to stderr. `RUST_LOG` overrides
/// the `info` default.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
