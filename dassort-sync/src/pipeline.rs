//! One poll, start to finish.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dassort_core::types::{Profile, ProfileName, Settings};
use dassort_router::Router;

use crate::dispatcher::{self, DispatchOptions, DispatchOutcome};
use crate::error::SyncError;
use crate::executor::{executor_for, TransferExecutor};
use crate::resolver;
use crate::scanner::{self, Group, GroupKind};
use crate::stability::{self, ManifestSnapshot, Stability, StabilityGate};

type BoxedExecutor = Box<dyn TransferExecutor + Send + Sync>;

// ---------------------------------------------------------------------------
// Options and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub source: PathBuf,
    /// Gap between the two manifest samples.
    pub settle: Duration,
    pub dry_run: bool,
    pub delete: bool,
}

impl PollOptions {
    fn dispatch(&self) -> DispatchOptions {
        DispatchOptions {
            dry_run: self.dry_run,
            delete: self.delete,
        }
    }
}

/// One dispatched group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: PathBuf,
    pub kind: GroupKind,
    pub profile: ProfileName,
    pub destination: String,
    pub outcome: DispatchOutcome,
}

/// Summary of one poll.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub started_at: DateTime<Utc>,
    pub groups_seen: usize,
    pub unstable: usize,
    pub unrouted: usize,
    /// Groups skipped on a per-group error (unreadable descriptor,
    /// unresolvable path).
    pub failed_groups: usize,
    /// Files transferred across all groups; drives the backoff.
    pub processed: usize,
    pub groups: Vec<GroupReport>,
}

impl PollReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            groups_seen: 0,
            unstable: 0,
            unrouted: 0,
            failed_groups: 0,
            processed: 0,
            groups: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Loaded settings plus one executor per profile.
pub struct Poller {
    settings: Settings,
    router: Option<Router>,
    options: PollOptions,
    executors: BTreeMap<ProfileName, BoxedExecutor>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("profiles", &self.executors.keys().collect::<Vec<_>>())
            .field("router", &self.router.as_ref().map(Router::len))
            .field("options", &self.options)
            .finish()
    }
}

impl Poller {
    /// Executors follow each profile's copy protocol; shell calls are
    /// bounded by `timeout`.
    pub fn new(settings: Settings, options: PollOptions, timeout: Duration) -> Result<Self, SyncError> {
        Self::with_executors(settings, options, |profile| {
            executor_for(&profile.remote, timeout)
        })
    }

    /// Build with a caller-chosen executor per profile.
    pub fn with_executors(
        settings: Settings,
        options: PollOptions,
        mut make: impl FnMut(&Profile) -> BoxedExecutor,
    ) -> Result<Self, SyncError> {
        let router = settings.router.as_ref().map(Router::new).transpose()?;
        let executors = settings
            .profiles
            .iter()
            .map(|p| (p.name.clone(), make(p)))
            .collect();
        Ok(Self {
            settings,
            router,
            options,
            executors,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Scan, settle, route, resolve and dispatch everything currently in
    /// the source directory.
    ///
    /// Only a listing failure of the source directory or a fatal error
    /// ends the poll early; every other failure skips one group.
    pub fn poll(&self) -> Result<PollReport, SyncError> {
        let mut report = PollReport::new();
        let groups = scanner::scan(&self.options.source)?;
        report.groups_seen = groups.len();

        let mut candidates = Vec::new();
        for group in groups {
            match ManifestSnapshot::capture(&group) {
                Ok(snapshot) if snapshot.is_empty() => {
                    tracing::info!("{} has nothing to send yet", group.path.display());
                    report.unstable += 1;
                }
                Ok(snapshot) => candidates.push((group, snapshot)),
                Err(err) => {
                    tracing::info!("{} changed during the scan: {err}", group.path.display());
                    report.unstable += 1;
                }
            }
        }
        if candidates.is_empty() {
            tracing::debug!("no candidate groups in {}", self.options.source.display());
            return Ok(report);
        }

        StabilityGate::new(self.options.settle).wait();

        for (group, before) in candidates {
            let manifest = match stability::confirm(&group, before) {
                Ok(Stability::Stable(snapshot)) => snapshot.into_files(),
                Ok(_) => {
                    tracing::info!("{} is still changing; retrying next poll", group.path.display());
                    report.unstable += 1;
                    continue;
                }
                Err(err) => {
                    tracing::info!("{} changed during the scan: {err}", group.path.display());
                    report.unstable += 1;
                    continue;
                }
            };

            match self.process(&group, &manifest) {
                Ok(Some(group_report)) => {
                    report.processed += group_report.outcome.processed;
                    report.groups.push(group_report);
                }
                Ok(None) => report.unrouted += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!("skipping {}: {err}", group.path.display());
                    report.failed_groups += 1;
                }
            }
        }

        tracing::info!(
            "poll done: {} group(s), {} dispatched, {} file(s) processed",
            report.groups_seen,
            report.groups.len(),
            report.processed
        );
        Ok(report)
    }

    /// Route, resolve and dispatch one stable group. `None` when no rule
    /// claims it.
    fn process(&self, group: &Group, manifest: &[PathBuf]) -> Result<Option<GroupReport>, SyncError> {
        let descriptors = group.read_descriptors()?;
        let Some(profile) = self.select_profile(&descriptors) else {
            tracing::info!("{} matches no router rule", group.path.display());
            return Ok(None);
        };
        let Some(executor) = self.executors.get(&profile.name) else {
            tracing::warn!("no executor for profile {}", profile.name);
            return Ok(None);
        };

        let authoritative = descriptors.first().cloned().unwrap_or_default();
        let dest = resolver::resolve(profile, group, &authoritative)?;
        tracing::debug!("{} -> {} via {}", group.path.display(), dest.path, profile.name);

        let outcome = dispatcher::dispatch(
            executor.as_ref(),
            profile,
            group,
            manifest,
            &dest,
            self.options.dispatch(),
        )?;
        Ok(Some(GroupReport {
            group: group.path.clone(),
            kind: group.kind,
            profile: profile.name.clone(),
            destination: dest.path,
            outcome,
        }))
    }

    fn select_profile(&self, descriptors: &[serde_json::Value]) -> Option<&Profile> {
        match &self.router {
            Some(router) => self.settings.profile(router.route(descriptors)?),
            None => self.settings.default_profile(),
        }
    }
}
