//! Hand a stable, routed group to its executor.
//!
//! Transfers run file by file in manifest order. Follow-up commands run
//! after all transfers, at most once per (group, extension), and only for
//! extensions with a file that was transferred in the same call.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use dassort_core::types::Profile;
use dassort_renderer::PathContext;

use crate::error::SyncError;
use crate::executor::TransferExecutor;
use crate::resolver::ResolvedDestination;
use crate::scanner::Group;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Log every would-be action; execute and count nothing.
    pub dry_run: bool,
    /// Remove each local file after its transfer succeeds.
    pub delete: bool,
}

/// What happened to one group's manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// Files transferred successfully.
    pub processed: usize,
    /// Files whose transfer failed; retried next poll.
    pub failed: usize,
    /// Files not attempted because the destination could not be ensured.
    pub skipped: usize,
    /// Commands handed to the executor.
    pub commands: Vec<String>,
}

/// Refuse triggers that would fire again on every poll.
///
/// A matching file stays in the source directory unless delete is on, so
/// its command would be re-issued on each poll.
pub fn check_trigger_policy(
    profile: &Profile,
    group: &Group,
    manifest: &[PathBuf],
    options: DispatchOptions,
) -> Result<(), SyncError> {
    if options.delete || options.dry_run {
        return Ok(());
    }
    for rule in &profile.commands {
        if manifest.iter().any(|f| file_name(f).ends_with(&rule.ext)) {
            return Err(SyncError::TriggerPolicy {
                group: group.path.clone(),
                ext: rule.ext.clone(),
            });
        }
    }
    Ok(())
}

/// Transfer `manifest` to `dest` and issue any triggered commands.
pub fn dispatch(
    executor: &dyn TransferExecutor,
    profile: &Profile,
    group: &Group,
    manifest: &[PathBuf],
    dest: &ResolvedDestination,
    options: DispatchOptions,
) -> Result<DispatchOutcome, SyncError> {
    check_trigger_policy(profile, group, manifest, options)?;

    let mut outcome = DispatchOutcome::default();
    // Files that reached the remote in this call; only these fire triggers.
    let mut sent: Vec<&PathBuf> = Vec::new();
    tracing::info!("sending {} to {}", group.path.display(), dest.path);

    for (i, file) in manifest.iter().enumerate() {
        if options.dry_run {
            tracing::info!("would copy {} to {}", file.display(), dest.path);
            if options.delete {
                tracing::info!("would delete {}", file.display());
            }
            sent.push(file);
            continue;
        }

        if let Err(err) = executor.ensure_destination(&dest.path) {
            outcome.skipped = manifest.len() - i;
            tracing::warn!(
                "cannot create {}: {err}; leaving {} file(s) of {} for the next poll",
                dest.path,
                outcome.skipped,
                group.path.display()
            );
            break;
        }

        match executor.transfer_file(file, &dest.path) {
            Ok(()) => {
                outcome.processed += 1;
                sent.push(file);
                if options.delete {
                    if let Err(err) = fs::remove_file(file) {
                        tracing::error!("copied but could not delete {}: {err}", file.display());
                    } else {
                        tracing::debug!("deleted {}", file.display());
                    }
                }
            }
            Err(err) => {
                outcome.failed += 1;
                tracing::warn!("copy of {} failed: {err}", file.display());
            }
        }
    }

    for rule in &profile.commands {
        let Some(trigger) = sent.iter().find(|f| file_name(f).ends_with(&rule.ext)) else {
            continue;
        };
        if !executor.copies() {
            tracing::info!(
                "nocopy: not issuing the '{}' command for {}",
                rule.ext,
                group.path.display()
            );
            continue;
        }

        let command = command_context(profile, dest, trigger)
            .render(&rule.run)
            .map_err(|source| SyncError::Resolve {
                group: group.path.clone(),
                source,
            })?;

        if options.dry_run {
            tracing::info!("would issue: {command}");
            continue;
        }
        tracing::info!("issuing: {command}");
        if let Err(err) = executor.issue_command(&command) {
            tracing::error!("command for {} failed: {err}", group.path.display());
        }
        outcome.commands.push(command);
    }

    Ok(outcome)
}

/// Variables available to command templates.
fn command_context(profile: &Profile, dest: &ResolvedDestination, trigger: &Path) -> PathContext {
    let name = file_name(trigger);
    let remote = &profile.remote;
    let mut ctx = PathContext::new();
    ctx.set("path", Value::String(join_remote(&dest.path, &name)));
    ctx.set("file", Value::String(name));
    ctx.set("dest", Value::String(dest.path.clone()));
    ctx.set("user", Value::String(remote.user.clone()));
    ctx.set("host", Value::String(remote.host.clone()));
    ctx.set("cmd_host", Value::String(remote.cmd_host.clone()));
    ctx
}

/// Join a remote directory and a file name with exactly one `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Call, RecordingExecutor};
    use crate::executor::NoCopyExecutor;
    use crate::scanner::GroupKind;
    use dassort_core::types::{CommandRule, CopyProtocol, ProfileName, RemoteTarget};
    use rstest::rstest;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        group: Group,
        manifest: Vec<PathBuf>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let dir = TempDir::new().expect("src");
        let descriptor = dir.path().join("job1.json");
        fs::write(&descriptor, b"{}").unwrap();
        let manifest = names
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                fs::write(&p, b"payload").unwrap();
                p
            })
            .collect();
        Fixture {
            group: Group {
                path: descriptor.clone(),
                kind: GroupKind::File,
                descriptors: vec![descriptor],
            },
            manifest,
            _dir: dir,
        }
    }

    fn profile(commands: Vec<CommandRule>) -> Profile {
        Profile {
            name: ProfileName::from("camera.yaml"),
            keys: Vec::new(),
            map: Vec::new(),
            defaults: Vec::new(),
            path_template: "${root}".into(),
            destination_root: "/out".into(),
            commands,
            remote: RemoteTarget {
                user: "lab".into(),
                host: "store".into(),
                cmd_host: "cluster".into(),
                copy_protocol: CopyProtocol::Scp,
            },
        }
    }

    fn avi_trigger() -> Vec<CommandRule> {
        vec![CommandRule {
            ext: ".avi".into(),
            run: "ssh ${user}@${cmd_host} 'track \"${path}\"'".into(),
        }]
    }

    fn dest(path: &str) -> ResolvedDestination {
        ResolvedDestination {
            path: path.into(),
            context: PathContext::new(),
        }
    }

    const DELETE: DispatchOptions = DispatchOptions {
        dry_run: false,
        delete: true,
    };

    #[test]
    fn transfers_each_file_after_ensuring_the_destination() {
        let fx = fixture(&["job1.data", "job1.log"]);
        let exec = RecordingExecutor::new();
        let out = dispatch(
            &exec,
            &profile(Vec::new()),
            &fx.group,
            &fx.manifest,
            &dest("/out/S01"),
            DispatchOptions::default(),
        )
        .unwrap();

        assert_eq!(out.processed, 2);
        assert_eq!(
            exec.calls(),
            vec![
                Call::Ensure("/out/S01".into()),
                Call::Transfer(fx.manifest[0].clone(), "/out/S01".into()),
                Call::Ensure("/out/S01".into()),
                Call::Transfer(fx.manifest[1].clone(), "/out/S01".into()),
            ]
        );
        assert!(fx.manifest.iter().all(|f| f.exists()));
    }

    #[test]
    fn delete_removes_only_transferred_files() {
        let fx = fixture(&["job1.bad", "job1.data"]);
        let exec = RecordingExecutor::new().failing_transfer(".bad");
        let out = dispatch(&exec, &profile(Vec::new()), &fx.group, &fx.manifest, &dest("/o"), DELETE)
            .unwrap();

        assert_eq!((out.processed, out.failed), (1, 1));
        assert!(fx.manifest[0].exists());
        assert!(!fx.manifest[1].exists());
    }

    #[test]
    fn ensure_failure_abandons_the_rest_of_the_group() {
        let fx = fixture(&["job1.a", "job1.b", "job1.c"]);
        let exec = RecordingExecutor::new().failing_ensure();
        let out = dispatch(&exec, &profile(Vec::new()), &fx.group, &fx.manifest, &dest("/o"), DELETE)
            .unwrap();

        assert_eq!(out.processed, 0);
        assert_eq!(out.skipped, 3);
        assert_eq!(exec.calls(), vec![Call::Ensure("/o".into())]);
        assert!(fx.manifest.iter().all(|f| f.exists()));
    }

    #[test]
    fn trigger_without_delete_is_refused_before_any_transfer() {
        let fx = fixture(&["job1.avi"]);
        let exec = RecordingExecutor::new();
        let err = dispatch(
            &exec,
            &profile(avi_trigger()),
            &fx.group,
            &fx.manifest,
            &dest("/o"),
            DispatchOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::TriggerPolicy { ref ext, .. } if ext == ".avi"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn trigger_runs_once_per_extension_with_the_first_match() {
        let fx = fixture(&["job1_a.avi", "job1_b.avi", "job1.data"]);
        let exec = RecordingExecutor::new();
        let out = dispatch(&exec, &profile(avi_trigger()), &fx.group, &fx.manifest, &dest("/out/S01"), DELETE)
            .unwrap();

        assert_eq!(out.processed, 3);
        assert_eq!(
            exec.commands(),
            vec!["ssh lab@cluster 'track \"/out/S01/job1_a.avi\"'".to_string()]
        );
        assert_eq!(out.commands, exec.commands());
    }

    #[test]
    fn failed_ensure_fires_no_trigger() {
        let fx = fixture(&["job1.avi"]);
        let exec = RecordingExecutor::new().failing_ensure();
        let out = dispatch(&exec, &profile(avi_trigger()), &fx.group, &fx.manifest, &dest("/o"), DELETE)
            .unwrap();

        assert_eq!(out.skipped, 1);
        assert!(out.commands.is_empty());
        assert!(exec.commands().is_empty());
        assert!(fx.manifest[0].exists());
    }

    #[test]
    fn failed_trigger_transfer_fires_no_trigger() {
        let fx = fixture(&["job1.avi", "job1.data"]);
        let exec = RecordingExecutor::new().failing_transfer(".avi");
        let out = dispatch(&exec, &profile(avi_trigger()), &fx.group, &fx.manifest, &dest("/o"), DELETE)
            .unwrap();

        assert_eq!((out.processed, out.failed), (1, 1));
        assert!(exec.commands().is_empty());
        assert!(fx.manifest[0].exists());
    }

    #[test]
    fn trigger_path_names_the_first_transferred_match() {
        let fx = fixture(&["job1_a.avi", "job1_b.avi"]);
        let exec = RecordingExecutor::new().failing_transfer("_a.avi");
        dispatch(&exec, &profile(avi_trigger()), &fx.group, &fx.manifest, &dest("/out/S01"), DELETE)
            .unwrap();

        assert_eq!(
            exec.commands(),
            vec!["ssh lab@cluster 'track \"/out/S01/job1_b.avi\"'".to_string()]
        );
    }

    #[test]
    fn nocopy_counts_and_deletes_but_suppresses_triggers() {
        let fx = fixture(&["job1.avi"]);
        let out = dispatch(
            &NoCopyExecutor,
            &profile(avi_trigger()),
            &fx.group,
            &fx.manifest,
            &dest("/o"),
            DELETE,
        )
        .unwrap();

        assert_eq!(out.processed, 1);
        assert!(out.commands.is_empty());
        assert!(!fx.manifest[0].exists());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn dry_run_executes_and_counts_nothing(#[case] delete: bool) {
        let fx = fixture(&["job1.avi", "job1.data"]);
        let exec = RecordingExecutor::new();
        let out = dispatch(
            &exec,
            &profile(avi_trigger()),
            &fx.group,
            &fx.manifest,
            &dest("/o"),
            DispatchOptions { dry_run: true, delete },
        )
        .unwrap();

        assert_eq!(out, DispatchOutcome::default());
        assert!(exec.calls().is_empty());
        assert!(fx.manifest.iter().all(|f| f.exists()));
    }

    #[test]
    fn unrenderable_command_is_a_resolve_error() {
        let fx = fixture(&["job1.avi"]);
        let rules = vec![CommandRule {
            ext: ".avi".into(),
            run: "notify ${nobody}".into(),
        }];
        let err = dispatch(&RecordingExecutor::new(), &profile(rules), &fx.group, &fx.manifest, &dest("/o"), DELETE)
            .unwrap_err();
        assert!(matches!(err, SyncError::Resolve { .. }));
    }

    #[rstest]
    #[case("/out/S01", "x.avi", "/out/S01/x.avi")]
    #[case("/out/S01/", "x.avi", "/out/S01/x.avi")]
    #[case("", "x.avi", "x.avi")]
    fn joins_remote_paths(#[case] dir: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(join_remote(dir, name), expected);
    }
}
