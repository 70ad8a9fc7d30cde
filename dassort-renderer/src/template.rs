//! `${name}` substitution.
//!
//! Every token must resolve. A missing variable is an error rather than an
//! empty string: a destination path with a silently dropped segment is worse
//! than a skipped group.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::RenderError;

/// Anything that can answer "what is `${name}`".
pub trait Variables {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Variables for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for serde_json::Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^{}]+)\}").expect("token pattern is valid"))
}

/// Render `template`, replacing each `${name}` with its variable's text.
///
/// Strings are inserted verbatim; numbers and booleans use their JSON text.
/// A `$` that does not start a complete `${...}` token is copied as-is.
pub fn render<V: Variables + ?Sized>(template: &str, vars: &V) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in token_re().captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let name = name.as_str();
        let value = vars
            .lookup(name)
            .ok_or_else(|| RenderError::MissingVariable {
                name: name.to_string(),
            })?;
        out.push_str(&value_text(name, value)?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Variable names referenced by `template`, in order of first appearance.
pub fn referenced_names(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for caps in token_re().captures_iter(template) {
        if let Some(name) = caps.get(1).map(|m| m.as_str()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Text form of a scalar, or [`RenderError::NotRenderable`].
pub fn value_text<'a>(name: &str, value: &'a Value) -> Result<Cow<'a, str>, RenderError> {
    let kind = match value {
        Value::String(s) => return Ok(Cow::Borrowed(s.as_str())),
        Value::Number(n) => return Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => return Ok(Cow::Owned(b.to_string())),
        Value::Null => "null",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    };
    Err(RenderError::NotRenderable {
        name: name.to_string(),
        kind,
    })
}
