//! YAML configuration loading.
//!
//! # Layout
//!
//! ```text
//! <config dir>/
//!   camera.yaml     (profile: `dassort:` section, optional `remote:` section)
//!   ephys.yaml      (profile)
//!   router.yaml     (`router:` section, at most one per directory)
//! ```
//!
//! Files are read in file-name order. The first profile is the default when
//! no router is configured. Parallel lists must line up; nothing is wrapped
//! around silently.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{io_err, ConfigError};
use crate::types::{
    CommandRule, CopyProtocol, Profile, ProfileName, RemoteTarget, RouteRule, RouterConfig,
    Settings,
};

/// Config file extension.
pub const CONFIG_EXT: &str = "yaml";

// ---------------------------------------------------------------------------
// 1. Defaults coming from the command line / environment
// ---------------------------------------------------------------------------

/// Values a profile falls back to when its file does not set them.
#[derive(Debug, Clone, Default)]
pub struct RunDefaults {
    /// Destination root used when a profile has no `destination`.
    pub destination: String,
    pub user: Option<String>,
    pub host: Option<String>,
    pub cmd_host: Option<String>,
    /// Unparsed so that a bad value surfaces as [`ConfigError::UnknownProtocol`].
    pub copy_protocol: String,
}

// ---------------------------------------------------------------------------
// 2. Raw YAML shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFile {
    dassort: Option<RawProfile>,
    remote: Option<RawRemote>,
    router: Option<RawRouter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    #[serde(default)]
    json: RawJsonMap,
    path: String,
    destination: Option<String>,
    command: Option<RawCommand>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJsonMap {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    map: Vec<String>,
    #[serde(default)]
    default: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCommand {
    exts: Option<OneOrMany<String>>,
    run: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    user: Option<String>,
    host: Option<String>,
    cmd_host: Option<String>,
    copy_protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRouter {
    filter: OneOrMany<String>,
    key: OneOrMany<String>,
    files: OneOrMany<String>,
    lowercase: Option<OneOrMany<bool>>,
    invert: Option<OneOrMany<bool>>,
    exact: Option<OneOrMany<bool>>,
}

/// A YAML scalar or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }

    /// Exactly `len` entries, with a scalar or one-element list broadcast.
    fn expand(self, len: usize, context: &str) -> Result<Vec<T>, ConfigError> {
        let items = self.into_vec();
        match items.len() {
            1 => Ok(vec![items[0].clone(); len]),
            n if n == len => Ok(items),
            found => Err(ConfigError::LengthMismatch {
                context: context.to_string(),
                expected: len,
                found,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// What a single config file turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEntry {
    Profile(Profile),
    Router(RouterConfig),
}

/// Load every `*.yaml` in `dir` and validate the result as a whole.
pub fn load_dir(dir: &Path, defaults: &RunDefaults) -> Result<Settings, ConfigError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some(CONFIG_EXT))
        .collect();
    files.sort();

    let mut profiles = Vec::new();
    let mut router: Option<(PathBuf, RouterConfig)> = None;

    for path in files {
        match parse_file(&path, defaults)? {
            ConfigEntry::Profile(profile) => profiles.push(profile),
            ConfigEntry::Router(config) => {
                if let Some((first, _)) = &router {
                    return Err(ConfigError::DuplicateRouter {
                        first: first.clone(),
                        second: path,
                    });
                }
                router = Some((path, config));
            }
        }
    }

    if profiles.is_empty() {
        return Err(ConfigError::NoProfiles {
            dir: dir.to_path_buf(),
        });
    }

    let router = router.map(|(_, config)| config);
    if let Some(config) = &router {
        for rule in &config.rules {
            if !profiles.iter().any(|p| p.name == rule.profile) {
                return Err(ConfigError::UnknownProfile {
                    name: rule.profile.0.clone(),
                });
            }
        }
    }

    Ok(Settings { profiles, router })
}

/// Parse a single config file. The profile name is the file's base name.
pub fn parse_file(path: &Path, defaults: &RunDefaults) -> Result<ConfigEntry, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let raw: RawFile = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match (raw.dassort, raw.router) {
        (Some(profile), None) => Ok(ConfigEntry::Profile(build_profile(
            ProfileName::from(name),
            profile,
            raw.remote,
            defaults,
        )?)),
        (None, Some(router)) if raw.remote.is_none() => {
            Ok(ConfigEntry::Router(build_router(router)?))
        }
        (None, Some(_)) => Err(ConfigError::Misspecified {
            path: path.to_path_buf(),
            reason: "a router file cannot carry a remote section",
        }),
        (Some(_), Some(_)) => Err(ConfigError::Misspecified {
            path: path.to_path_buf(),
            reason: "a file holds either a dassort profile or a router, not both",
        }),
        (None, None) => Err(ConfigError::Misspecified {
            path: path.to_path_buf(),
            reason: "expected a `dassort` or `router` section",
        }),
    }
}

// ---------------------------------------------------------------------------
// 4. Validation
// ---------------------------------------------------------------------------

fn build_profile(
    name: ProfileName,
    raw: RawProfile,
    remote: Option<RawRemote>,
    defaults: &RunDefaults,
) -> Result<Profile, ConfigError> {
    let RawJsonMap { keys, map, default } = raw.json;
    for (label, found) in [("json.map", map.len()), ("json.default", default.len())] {
        if found != keys.len() {
            return Err(ConfigError::LengthMismatch {
                context: format!("{name}: {label} must match json.keys"),
                expected: keys.len(),
                found,
            });
        }
    }

    let commands = match raw.command {
        None => Vec::new(),
        Some(command) => {
            let exts = command.exts.map(OneOrMany::into_vec).unwrap_or_default();
            match command.run {
                None if exts.is_empty() => Vec::new(),
                None => {
                    return Err(ConfigError::LengthMismatch {
                        context: format!("{name}: command.run must match command.exts"),
                        expected: exts.len(),
                        found: 0,
                    })
                }
                Some(run) => {
                    let runs = run.expand(
                        exts.len(),
                        &format!("{name}: command.run must match command.exts"),
                    )?;
                    exts.into_iter()
                        .zip(runs)
                        .map(|(ext, run)| CommandRule { ext, run })
                        .collect()
                }
            }
        }
    };

    let remote = resolve_remote(&name, remote, defaults)?;

    Ok(Profile {
        keys,
        map,
        defaults: default,
        path_template: raw.path,
        destination_root: raw
            .destination
            .unwrap_or_else(|| defaults.destination.clone()),
        commands,
        remote,
        name,
    })
}

fn resolve_remote(
    profile: &ProfileName,
    raw: Option<RawRemote>,
    defaults: &RunDefaults,
) -> Result<RemoteTarget, ConfigError> {
    let raw = raw.unwrap_or(RawRemote {
        user: None,
        host: None,
        cmd_host: None,
        copy_protocol: None,
    });

    let user = raw.user.or_else(|| defaults.user.clone()).unwrap_or_default();
    let host = raw.host.or_else(|| defaults.host.clone()).unwrap_or_default();
    let cmd_host = raw
        .cmd_host
        .or_else(|| defaults.cmd_host.clone())
        .unwrap_or_else(|| host.clone());
    let copy_protocol: CopyProtocol = raw
        .copy_protocol
        .as_deref()
        .unwrap_or(&defaults.copy_protocol)
        .parse()?;

    if copy_protocol == CopyProtocol::Scp {
        if user.is_empty() {
            return Err(ConfigError::MissingRemote {
                profile: profile.0.clone(),
                field: "user",
            });
        }
        if host.is_empty() {
            return Err(ConfigError::MissingRemote {
                profile: profile.0.clone(),
                field: "host",
            });
        }
    }

    Ok(RemoteTarget {
        user,
        host,
        cmd_host,
        copy_protocol,
    })
}

fn build_router(raw: RawRouter) -> Result<RouterConfig, ConfigError> {
    let patterns = raw.filter.into_vec();
    let count = patterns.len();
    if count == 0 {
        return Err(ConfigError::LengthMismatch {
            context: "router.filter must not be empty".to_string(),
            expected: 1,
            found: 0,
        });
    }

    let files = raw.files.into_vec();
    if files.len() != count {
        return Err(ConfigError::LengthMismatch {
            context: "router.files must match router.filter".to_string(),
            expected: count,
            found: files.len(),
        });
    }

    let fields = raw.key.expand(count, "router.key must match router.filter")?;
    let flags = |flag: Option<OneOrMany<bool>>, context: &str| match flag {
        Some(flag) => flag.expand(count, context),
        None => Ok(vec![false; count]),
    };
    let lowercase = flags(raw.lowercase, "router.lowercase must match router.filter")?;
    let invert = flags(raw.invert, "router.invert must match router.filter")?;
    let exact = flags(raw.exact, "router.exact must match router.filter")?;

    let rules = patterns
        .into_iter()
        .enumerate()
        .map(|(i, pattern)| RouteRule {
            pattern,
            field: fields[i].clone(),
            case_insensitive: lowercase[i],
            invert: invert[i],
            exact: exact[i],
            profile: ProfileName::from(files[i].clone()),
        })
        .collect();

    Ok(RouterConfig { rules })
}

// ---------------------------------------------------------------------------
// 5. Tests
// ---------------------------------------------------------------------------
