//! Transfer backends.
//!
//! The dispatcher talks to a [`TransferExecutor`]; which one is used follows
//! the profile's copy protocol.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use dassort_core::types::{CopyProtocol, RemoteTarget};

use crate::error::ExecError;

const POLL_STEP: Duration = Duration::from_millis(50);

/// Remote side effects of dispatching a group.
pub trait TransferExecutor {
    /// Create `dest` (and parents) on the remote host. Idempotent.
    fn ensure_destination(&self, dest: &str) -> Result<(), ExecError>;

    /// Copy one local file into `dest`.
    fn transfer_file(&self, local: &Path, dest: &str) -> Result<(), ExecError>;

    /// Run a rendered follow-up command.
    fn issue_command(&self, command: &str) -> Result<(), ExecError>;

    /// Whether transfers actually move data. Triggers are suppressed when not.
    fn copies(&self) -> bool {
        true
    }
}

/// Pick the executor for a profile's remote target.
pub fn executor_for(
    remote: &RemoteTarget,
    timeout: Duration,
) -> Box<dyn TransferExecutor + Send + Sync> {
    match remote.copy_protocol {
        CopyProtocol::Scp => Box::new(ShellExecutor::new(remote.clone(), timeout)),
        CopyProtocol::NoCopy => Box::new(NoCopyExecutor),
    }
}

// ---------------------------------------------------------------------------
// ssh / scp
// ---------------------------------------------------------------------------

/// `ssh`/`scp` against `user@host`; follow-up commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    remote: RemoteTarget,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(remote: RemoteTarget, timeout: Duration) -> Self {
        Self { remote, timeout }
    }

    fn login(&self) -> String {
        format!("{}@{}", self.remote.user, self.remote.host)
    }

    fn run(&self, program: &str, args: &[String]) -> Result<(), ExecError> {
        let display = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!("running: {display}");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;
        wait_bounded(child, &display, self.timeout)
    }
}

impl TransferExecutor for ShellExecutor {
    fn ensure_destination(&self, dest: &str) -> Result<(), ExecError> {
        self.run("ssh", &[self.login(), format!("mkdir -p \"{dest}\"")])
    }

    fn transfer_file(&self, local: &Path, dest: &str) -> Result<(), ExecError> {
        self.run(
            "scp",
            &[
                local.display().to_string(),
                format!("{}:\"{dest}\"", self.login()),
            ],
        )
    }

    fn issue_command(&self, command: &str) -> Result<(), ExecError> {
        self.run("sh", &["-c".to_string(), command.to_string()])
    }
}

/// Wait for `child`, killing it once `timeout` has passed.
///
/// Stderr is drained on its own thread while waiting so a chatty child
/// never blocks on a full pipe.
fn wait_bounded(mut child: Child, command: &str, timeout: Duration) -> Result<(), ExecError> {
    let reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                // Not joined: a surviving grandchild may still hold the pipe.
                drop(reader);
                return Err(ExecError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_STEP),
            Err(source) => {
                return Err(ExecError::Spawn {
                    program: command.to_string(),
                    source,
                })
            }
        }
    };

    if status.success() {
        return Ok(());
    }
    let stderr = reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).trim().to_string())
        .unwrap_or_default();
    Err(ExecError::Status {
        command: command.to_string(),
        status: if stderr.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {stderr}")
        },
    })
}

// ---------------------------------------------------------------------------
// nocopy
// ---------------------------------------------------------------------------

/// Every call succeeds and nothing leaves the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCopyExecutor;

impl TransferExecutor for NoCopyExecutor {
    fn ensure_destination(&self, _dest: &str) -> Result<(), ExecError> {
        Ok(())
    }

    fn transfer_file(&self, _local: &Path, _dest: &str) -> Result<(), ExecError> {
        Ok(())
    }

    fn issue_command(&self, _command: &str) -> Result<(), ExecError> {
        Ok(())
    }

    fn copies(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Recording executor for tests
// ---------------------------------------------------------------------------

pub mod testing {
    //! An in-memory executor that records every call.

    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use super::TransferExecutor;
    use crate::error::ExecError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Ensure(String),
        Transfer(PathBuf, String),
        Command(String),
    }

    /// Clones share one call log.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingExecutor {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_ensure: bool,
        fail_transfer_of: Option<String>,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every `ensure_destination` call fails.
        pub fn failing_ensure(mut self) -> Self {
            self.fail_ensure = true;
            self
        }

        /// Transfers of files whose name ends with `suffix` fail.
        pub fn failing_transfer(mut self, suffix: &str) -> Self {
            self.fail_transfer_of = Some(suffix.to_string());
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Command(cmd) => Some(cmd),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn refused(command: String) -> ExecError {
            ExecError::Status {
                command,
                status: "exit status: 1".to_string(),
            }
        }
    }

    impl TransferExecutor for RecordingExecutor {
        fn ensure_destination(&self, dest: &str) -> Result<(), ExecError> {
            self.record(Call::Ensure(dest.to_string()));
            if self.fail_ensure {
                return Err(Self::refused(format!("mkdir -p {dest}")));
            }
            Ok(())
        }

        fn transfer_file(&self, local: &Path, dest: &str) -> Result<(), ExecError> {
            self.record(Call::Transfer(local.to_path_buf(), dest.to_string()));
            let name = local.to_string_lossy();
            match &self.fail_transfer_of {
                Some(suffix) if name.ends_with(suffix.as_str()) => {
                    Err(Self::refused(format!("scp {name}")))
                }
                _ => Ok(()),
            }
        }

        fn issue_command(&self, command: &str) -> Result<(), ExecError> {
            self.record(Call::Command(command.to_string()));
            Ok(())
        }
    }
}
