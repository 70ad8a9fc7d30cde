//! Destination path resolution for one group.

use serde::Serialize;
use serde_json::Value;

use dassort_core::types::Profile;
use dassort_renderer::{search, PathContext};

use crate::error::SyncError;
use crate::scanner::Group;

/// Descriptor field that overrides the profile's destination root.
pub const DESTINATION_FIELD: &str = "destination";

/// A rendered destination plus the variables it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDestination {
    pub path: String,
    pub context: PathContext,
}

/// Build the per-group context: profile defaults, then descriptor values,
/// then `root`, `sub_folder` and `sub`.
pub fn build_context(profile: &Profile, group: &Group, descriptor: &Value) -> PathContext {
    let mut ctx = PathContext::seeded(
        profile
            .map
            .iter()
            .map(String::as_str)
            .zip(profile.defaults.iter()),
    );

    for (key, var, default) in profile.bindings() {
        let current = ctx.get(var).cloned().unwrap_or_else(|| default.clone());
        let value = search::first_or(key, descriptor, &current).clone();
        ctx.set(var, value);
    }

    let root = match descriptor.get(DESTINATION_FIELD) {
        Some(v) if !v.is_null() => v.clone(),
        _ => Value::String(profile.destination_root.clone()),
    };
    ctx.set("root", root);

    let sub_folder = Value::String(group.sub_folder());
    if !profile.map.iter().any(|var| var == "sub") {
        ctx.set("sub", sub_folder.clone());
    }
    ctx.set("sub_folder", sub_folder);
    ctx
}

/// Render the profile's path template for `group`.
pub fn resolve(
    profile: &Profile,
    group: &Group,
    descriptor: &Value,
) -> Result<ResolvedDestination, SyncError> {
    let context = build_context(profile, group, descriptor);
    let path = context
        .render(&profile.path_template)
        .map_err(|source| SyncError::Resolve {
            group: group.path.clone(),
            source,
        })?;
    Ok(ResolvedDestination { path, context })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::GroupKind;
    use dassort_core::types::{CopyProtocol, ProfileName, RemoteTarget};
    use dassort_renderer::RenderError;
    use serde_json::json;
    use std::path::PathBuf;

    fn profile(template: &str) -> Profile {
        Profile {
            name: ProfileName::from("camera.yaml"),
            keys: vec!["subject".into(), "session".into()],
            map: vec!["subj".into(), "sess".into()],
            defaults: vec![json!("unknown"), json!(0)],
            path_template: template.into(),
            destination_root: "/out".into(),
            commands: Vec::new(),
            remote: RemoteTarget {
                user: "lab".into(),
                host: "store".into(),
                cmd_host: "store".into(),
                copy_protocol: CopyProtocol::NoCopy,
            },
        }
    }

    fn file_group() -> Group {
        Group {
            path: PathBuf::from("/src/job1.json"),
            kind: GroupKind::File,
            descriptors: vec![PathBuf::from("/src/job1.json")],
        }
    }

    fn dir_group() -> Group {
        Group {
            path: PathBuf::from("/src/session7"),
            kind: GroupKind::Directory,
            descriptors: vec![PathBuf::from("/src/session7/meta.json")],
        }
    }

    #[test]
    fn descriptor_values_fill_the_template() {
        let p = profile("${root}/${subj}${sub}");
        let dest = resolve(&p, &file_group(), &json!({"subject": "S01"})).unwrap();
        assert_eq!(dest.path, "/out/S01");
        assert_eq!(dest.context.get("sess"), Some(&json!(0)));
    }

    #[test]
    fn absent_key_falls_back_to_default() {
        let p = profile("${root}/${subj}/${sess}");
        let dest = resolve(&p, &file_group(), &json!({"rig": 2})).unwrap();
        assert_eq!(dest.path, "/out/unknown/0");
    }

    #[test]
    fn nested_keys_are_found() {
        let p = profile("${root}/${subj}/${sess}");
        let doc = json!({"meta": {"subject": "S02", "runs": [{"session": 4}]}});
        assert_eq!(resolve(&p, &file_group(), &doc).unwrap().path, "/out/S02/4");
    }

    #[test]
    fn descriptor_destination_overrides_root() {
        let p = profile("${root}/${subj}");
        let doc = json!({"subject": "S01", "destination": "/archive"});
        assert_eq!(resolve(&p, &file_group(), &doc).unwrap().path, "/archive/S01");
    }

    #[test]
    fn directory_groups_get_a_sub_folder() {
        let p = profile("${root}/${subj}/${sub_folder}");
        let dest = resolve(&p, &dir_group(), &json!({"subject": "S01"})).unwrap();
        assert_eq!(dest.path, "/out/S01/session7/");
        assert_eq!(dest.context.get("sub"), Some(&json!("session7/")));
    }

    #[test]
    fn mapped_sub_is_not_shadowed() {
        let mut p = profile("${root}/${sub}");
        p.keys.push("subgroup".into());
        p.map.push("sub".into());
        p.defaults.push(json!("none"));
        let dest = resolve(&p, &dir_group(), &json!({"subgroup": "g4"})).unwrap();
        assert_eq!(dest.path, "/out/g4");
    }

    #[test]
    fn unknown_variable_is_a_resolve_error() {
        let p = profile("${root}/${rig}");
        let err = resolve(&p, &file_group(), &json!({})).unwrap_err();
        let SyncError::Resolve { group, source } = err else {
            panic!("expected resolve error");
        };
        assert_eq!(group, PathBuf::from("/src/job1.json"));
        assert_eq!(source, RenderError::MissingVariable { name: "rig".into() });
    }

    #[test]
    fn structured_value_is_not_renderable() {
        let p = profile("${root}/${subj}");
        let err = resolve(&p, &file_group(), &json!({"subject": {"id": 1}})).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Resolve {
                source: RenderError::NotRenderable { .. },
                ..
            }
        ));
    }
}
