//! Polling scheduler: runs one poll at a time on a blocking worker, backs
//! off while the source directory is idle, stops on ctrl-c.

mod backoff;
mod error;
mod runtime;

pub use backoff::Backoff;
pub use error::DaemonError;
pub use runtime::{
    build_poller, init_tracing, run, run_until, start_blocking, RunSummary, SchedulerConfig,
};
