//! # dassort-sync
//!
//! One poll of the source directory: scan → stability gate → route →
//! resolve destination → dispatch.
//!
//! Build a [`Poller`] once from loaded settings and call [`Poller::poll`] as
//! often as the scheduler likes; nothing is remembered between polls.

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod resolver;
pub mod scanner;
pub mod stability;

pub use dispatcher::{DispatchOptions, DispatchOutcome};
pub use error::{ExecError, SyncError};
pub use executor::{executor_for, NoCopyExecutor, ShellExecutor, TransferExecutor};
pub use pipeline::{GroupReport, PollOptions, PollReport, Poller};
pub use resolver::ResolvedDestination;
pub use scanner::{Group, GroupKind};
pub use stability::{ManifestSnapshot, Stability, StabilityGate};
