//! Domain types for dassort.
//!
//! Everything here is built once at startup by [`crate::config`] and is
//! read-only afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a profile: the base name of the YAML file it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileName(pub String);

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProfileName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How manifest files leave the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CopyProtocol {
    /// `ssh mkdir -p` followed by `scp`.
    #[default]
    Scp,
    /// Nothing is copied; every transfer is an immediate success.
    NoCopy,
}

impl FromStr for CopyProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scp" => Ok(CopyProtocol::Scp),
            "nocopy" | "no-copy" => Ok(CopyProtocol::NoCopy),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for CopyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyProtocol::Scp => write!(f, "scp"),
            CopyProtocol::NoCopy => write!(f, "nocopy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Identity used by the external transfer executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    /// Host that follow-up commands are addressed to.
    pub cmd_host: String,
    pub copy_protocol: CopyProtocol,
}

/// One extension-triggered follow-up command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRule {
    /// Matched against the end of manifest file names (e.g. `.avi`).
    pub ext: String,
    /// Command template, rendered with `${path}`, `${file}`, `${user}`, ...
    pub run: String,
}

/// A named destination configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub name: ProfileName,
    /// Descriptor field names to extract, in order.
    pub keys: Vec<String>,
    /// Template variable per key.
    pub map: Vec<String>,
    /// Fallback value per template variable.
    pub defaults: Vec<Value>,
    pub path_template: String,
    pub destination_root: String,
    pub commands: Vec<CommandRule>,
    pub remote: RemoteTarget,
}

impl Profile {
    /// `(descriptor key, template variable, default)` triples.
    ///
    /// The three lists have equal length once loaded.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.keys
            .iter()
            .zip(self.map.iter())
            .zip(self.defaults.iter())
            .map(|((key, var), default)| (key.as_str(), var.as_str(), default))
    }

    /// Whether any command rule matches the given file name.
    pub fn has_trigger_for(&self, file_name: &str) -> bool {
        self.commands.iter().any(|c| file_name.ends_with(&c.ext))
    }
}

/// A single router position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRule {
    /// Regex searched for in the descriptor field.
    pub pattern: String,
    /// Top-level descriptor field the pattern is applied to.
    pub field: String,
    pub case_insensitive: bool,
    pub invert: bool,
    /// Wrap the pattern in word boundaries.
    pub exact: bool,
    /// Profile selected when this rule is the first to hit.
    pub profile: ProfileName,
}

/// Ordered classifier rules. The first rule that hits wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RouterConfig {
    pub rules: Vec<RouteRule>,
}

/// Everything loaded from a config directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Profiles in file-name order; never empty.
    pub profiles: Vec<Profile>,
    pub router: Option<RouterConfig>,
}

impl Settings {
    pub fn profile(&self, name: &ProfileName) -> Option<&Profile> {
        self.profiles.iter().find(|p| &p.name == name)
    }

    /// Profile used for every group when no router is configured.
    pub fn default_profile(&self) -> Option<&Profile> {
        self.profiles.first()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn copy_protocol_parses_known_spellings() {
        assert_eq!("scp".parse::<CopyProtocol>().unwrap(), CopyProtocol::Scp);
        assert_eq!("SCP".parse::<CopyProtocol>().unwrap(), CopyProtocol::Scp);
        assert_eq!("nocopy".parse::<CopyProtocol>().unwrap(), CopyProtocol::NoCopy);
        assert_eq!("no-copy".parse::<CopyProtocol>().unwrap(), CopyProtocol::NoCopy);
    }

    #[test]
    fn copy_protocol_rejects_rsync() {
        let err = "rsync".parse::<CopyProtocol>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProtocol(ref p) if p == "rsync"));
        assert!(err.to_string().contains("expected: scp, nocopy"));
    }

    #[test]
    fn bindings_line_up_keys_vars_and_defaults() {
        let profile = Profile {
            name: ProfileName::from("a.yaml"),
            keys: vec!["subject".into(), "session".into()],
            map: vec!["subj".into(), "sess".into()],
            defaults: vec![json!("unknown"), json!(0)],
            path_template: "${root}/${subj}".into(),
            destination_root: "/out".into(),
            commands: vec![CommandRule {
                ext: ".avi".into(),
                run: "true".into(),
            }],
            remote: RemoteTarget {
                user: String::new(),
                host: String::new(),
                cmd_host: String::new(),
                copy_protocol: CopyProtocol::NoCopy,
            },
        };
        let bound: Vec<_> = profile.bindings().collect();
        assert_eq!(bound[0], ("subject", "subj", &json!("unknown")));
        assert_eq!(bound[1], ("session", "sess", &json!(0)));
        assert!(profile.has_trigger_for("clip.avi"));
        assert!(!profile.has_trigger_for("clip.avi.json"));
    }

    #[test]
    fn profile_name_display() {
        assert_eq!(ProfileName::from("camera.yaml").to_string(), "camera.yaml");
    }
}
