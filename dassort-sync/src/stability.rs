//! Size-based settle check.
//!
//! A group is handed to dispatch only when two samples of its manifest, taken
//! one settle interval apart, agree on both the file set and every file size.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::SyncError;
use crate::scanner::Group;

/// Byte size of every manifest file at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSnapshot {
    sizes: BTreeMap<PathBuf, u64>,
}

impl ManifestSnapshot {
    /// Sample the group's current manifest. Files that vanish between
    /// listing and `stat` are left out.
    pub fn capture(group: &Group) -> Result<Self, SyncError> {
        let sizes = group
            .manifest()?
            .into_iter()
            .filter_map(|path| {
                let len = fs::metadata(&path).ok()?.len();
                Some((path, len))
            })
            .collect();
        Ok(Self { sizes })
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Manifest files, sorted.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.sizes.keys().map(PathBuf::as_path)
    }

    pub fn into_files(self) -> Vec<PathBuf> {
        self.sizes.into_keys().collect()
    }
}

/// Outcome of comparing two samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
    /// Both samples agree; dispatch the files in the snapshot.
    Stable(ManifestSnapshot),
    /// Nothing to transfer yet.
    Empty,
    Changed {
        before: ManifestSnapshot,
        after: ManifestSnapshot,
    },
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stability::Stable(_))
    }
}

/// Take the second sample and compare it with `before`.
pub fn confirm(group: &Group, before: ManifestSnapshot) -> Result<Stability, SyncError> {
    if before.is_empty() {
        return Ok(Stability::Empty);
    }
    let after = ManifestSnapshot::capture(group)?;
    if after == before {
        Ok(Stability::Stable(after))
    } else {
        Ok(Stability::Changed { before, after })
    }
}

/// Two-sample gate for a single group.
///
/// The poll pipeline samples every candidate, sleeps once, then calls
/// [`confirm`] per group; this type is the one-group form of the same check.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGate {
    pub settle: Duration,
}

impl StabilityGate {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Sample, wait the settle interval, sample again.
    pub fn check(&self, group: &Group) -> Result<Stability, SyncError> {
        let before = ManifestSnapshot::capture(group)?;
        if before.is_empty() {
            return Ok(Stability::Empty);
        }
        self.wait();
        confirm(group, before)
    }

    /// Block the calling thread for the settle interval.
    pub fn wait(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}
