//! Error types for dassort-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use dassort_renderer::RenderError;
use dassort_router::RouteError;

/// Failures of a single executor call. Always transient: the group is seen
/// again on the next poll.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Status { command: String, status: String },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// All errors that can arise while polling.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A descriptor could not be decoded (usually still being written).
    #[error("descriptor {path} is unreadable: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The destination path or a command could not be rendered for a group.
    #[error("cannot resolve destination for {group}: {source}")]
    Resolve {
        group: PathBuf,
        #[source]
        source: RenderError,
    },

    /// A router pattern failed to compile.
    #[error("router error: {0}")]
    Route(#[from] RouteError),

    /// Extension trigger configured without delete-on-success: the command
    /// would be re-issued on every poll.
    #[error(
        "group {group} matches trigger extension '{ext}' but delete is off; \
         enable --delete or the command would repeat every poll"
    )]
    TriggerPolicy { group: PathBuf, ext: String },
}

impl SyncError {
    /// Whether the error must stop the run instead of skipping one group.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Route(_) | SyncError::TriggerPolicy { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
