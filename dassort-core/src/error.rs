//! Error types for dassort-core.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems. All of them are fatal to a run and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while listing or reading config files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the file path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file is neither a profile nor a router (or claims to be both).
    #[error("config {path} is misspecified: {reason}")]
    Misspecified { path: PathBuf, reason: &'static str },

    /// No profile file was found in the config directory.
    #[error("no configuration file found in {dir}")]
    NoProfiles { dir: PathBuf },

    /// More than one router file; at most one may be active.
    #[error("router defined twice ({first} and {second}); only one router is allowed")]
    DuplicateRouter { first: PathBuf, second: PathBuf },

    /// Parallel lists whose lengths do not line up.
    #[error("{context}: expected {expected} entries, found {found}")]
    LengthMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Router refers to a profile file that was not loaded.
    #[error("router refers to unknown profile '{name}'")]
    UnknownProfile { name: String },

    /// Copy protocol other than `scp` / `nocopy`.
    #[error("unknown copy protocol '{0}'; expected: scp, nocopy")]
    UnknownProtocol(String),

    /// `scp` needs somewhere to copy to.
    #[error("profile '{profile}' uses scp but no remote {field} is set")]
    MissingRemote {
        profile: String,
        field: &'static str,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
