//! Group discovery.
//!
//! ```text
//! <source>/
//!   job1.json        file group     manifest: job1.data, job1_cam.avi
//!   job1.data
//!   job1_cam.avi
//!   session7/        directory group (holds a descriptor)
//!     meta.json      manifest: every regular file in session7/
//!     trace.bin
//!   scratch/         ignored (no descriptor)
//! ```
//!
//! Directory groups come first, then file groups; each list is sorted by
//! file name. Nothing is cached: every poll scans again.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{io_err, SyncError};

/// Descriptor file extension.
pub const DESCRIPTOR_EXT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// A loose descriptor plus the files sharing its base name.
    File,
    /// A subdirectory holding at least one descriptor.
    Directory,
}

/// A candidate group. Identity is its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub path: PathBuf,
    pub kind: GroupKind,
    /// Sorted; never empty. The first one drives path resolution.
    pub descriptors: Vec<PathBuf>,
}

impl Group {
    pub fn is_dir(&self) -> bool {
        self.kind == GroupKind::Directory
    }

    /// The authoritative descriptor.
    pub fn descriptor(&self) -> &Path {
        self.descriptors
            .first()
            .map(PathBuf::as_path)
            .unwrap_or(&self.path)
    }

    /// `<dir name>/` for directory groups, empty for file groups.
    pub fn sub_folder(&self) -> String {
        match self.kind {
            GroupKind::File => String::new(),
            GroupKind::Directory => self
                .path
                .file_name()
                .map(|n| format!("{}/", n.to_string_lossy()))
                .unwrap_or_default(),
        }
    }

    /// Current member files, sorted.
    pub fn manifest(&self) -> Result<Vec<PathBuf>, SyncError> {
        match self.kind {
            GroupKind::Directory => {
                Ok(sorted_files(&self.path)?.into_iter().map(|(p, _)| p).collect())
            }
            GroupKind::File => {
                let Some(dir) = self.path.parent() else {
                    return Ok(Vec::new());
                };
                let stem = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(sorted_files(dir)?
                    .into_iter()
                    .filter(|(path, name)| {
                        name.starts_with(&stem) && path != &self.path && !is_descriptor(path)
                    })
                    .map(|(p, _)| p)
                    .collect())
            }
        }
    }

    /// Decode every descriptor of the group, in order.
    pub fn read_descriptors(&self) -> Result<Vec<Value>, SyncError> {
        self.descriptors.iter().map(|p| read_descriptor(p)).collect()
    }
}

/// Whether `path` looks like a descriptor.
pub fn is_descriptor(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXT)
}

/// Decode one descriptor file.
pub fn read_descriptor(path: &Path) -> Result<Value, SyncError> {
    let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| SyncError::Descriptor {
        path: path.to_path_buf(),
        source,
    })
}

/// List the candidate groups directly under `source`.
pub fn scan(source: &Path) -> Result<Vec<Group>, SyncError> {
    let entries = sorted_entries(source)?;

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            match dir_descriptors(&path) {
                Ok(descriptors) if descriptors.is_empty() => {}
                Ok(descriptors) => {
                    if descriptors.len() > 1 {
                        tracing::warn!(
                            "{} holds {} descriptors; using {} for the destination path",
                            path.display(),
                            descriptors.len(),
                            descriptors[0].display()
                        );
                    }
                    dirs.push(Group {
                        path,
                        kind: GroupKind::Directory,
                        descriptors,
                    });
                }
                // Vanished or unreadable mid-scan: look again next poll.
                Err(err) => tracing::warn!("skipping {}: {err}", path.display()),
            }
        } else if path.is_file() && is_descriptor(&path) {
            files.push(Group {
                descriptors: vec![path.clone()],
                path,
                kind: GroupKind::File,
            });
        }
    }

    tracing::debug!(
        "scan of {} found {} directory and {} file groups",
        source.display(),
        dirs.len(),
        files.len()
    );
    dirs.extend(files);
    Ok(dirs)
}

fn dir_descriptors(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    Ok(sorted_files(dir)?
        .into_iter()
        .map(|(p, _)| p)
        .filter(|p| is_descriptor(p))
        .collect())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .map(|entry| entry.map(|e| e.path()).map_err(|e| io_err(dir, e)))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

/// Regular files directly inside `dir` with their file names, sorted.
fn sorted_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, SyncError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            Some((p, name))
        })
        .collect())
}
