//! Descriptor routing for `dassort-router`.
//!
//! [`Router::classify`] evaluates the configured rules in order against a
//! group's descriptors and returns the index of the first rule that hits.
//! Earlier rules take priority over later ones, exactly like the order of the
//! `filter` list in the router file.

use std::borrow::Cow;

use dassort_core::types::{ProfileName, RouteRule, RouterConfig};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from router construction.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("router rule {index} has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One rule, compiled.
#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    field: String,
    invert: bool,
    profile: ProfileName,
}

/// Ordered classifier over descriptor fields.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<CompiledRule>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl Router {
    /// Compile every rule. Exact rules are wrapped in word boundaries.
    pub fn new(config: &RouterConfig) -> Result<Self, RouteError> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| compile(index, rule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the first rule that hits, or `None` if the group is unrouted.
    ///
    /// A rule's raw match is true when its pattern matches the field of *any*
    /// of the descriptors (a directory group may carry several); `invert`
    /// negates that aggregate. A descriptor missing the field, or holding a
    /// list/object/null there, never contributes a match.
    pub fn classify(&self, descriptors: &[Value]) -> Option<usize> {
        self.rules.iter().position(|rule| rule.hits(descriptors))
    }

    /// Profile selected for the descriptors, if any rule hits.
    pub fn route(&self, descriptors: &[Value]) -> Option<&ProfileName> {
        self.classify(descriptors).map(|i| &self.rules[i].profile)
    }

    /// Profile named by rule `index`.
    pub fn profile_at(&self, index: usize) -> Option<&ProfileName> {
        self.rules.get(index).map(|r| &r.profile)
    }
}

// ---------------------------------------------------------------------------
// Rule evaluation
// ---------------------------------------------------------------------------

impl CompiledRule {
    fn hits(&self, descriptors: &[Value]) -> bool {
        let mut evaluated = false;
        let mut matched = false;
        for descriptor in descriptors {
            let Some(text) = field_text(descriptor, &self.field) else {
                continue;
            };
            evaluated = true;
            if self.regex.is_match(&text) {
                matched = true;
                break;
            }
        }
        evaluated && (matched != self.invert)
    }
}

fn compile(index: usize, rule: &RouteRule) -> Result<CompiledRule, RouteError> {
    let pattern = if rule.exact {
        format!(r"\b(?:{})\b", rule.pattern)
    } else {
        rule.pattern.clone()
    };
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(rule.case_insensitive)
        .build()
        .map_err(|source| RouteError::InvalidPattern {
            index,
            pattern: rule.pattern.clone(),
            source,
        })?;
    Ok(CompiledRule {
        regex,
        field: rule.field.clone(),
        invert: rule.invert,
        profile: rule.profile.clone(),
    })
}

/// Top-level field as text. Numbers and booleans match on their JSON text.
fn field_text<'a>(descriptor: &'a Value, field: &str) -> Option<Cow<'a, str>> {
    match descriptor.get(field)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(pattern: &str) -> RouteRule {
        RouteRule {
            pattern: pattern.to_string(),
            field: "subject".to_string(),
            case_insensitive: false,
            invert: false,
            exact: false,
            profile: ProfileName::from(format!("{pattern}.yaml")),
        }
    }

    #[test]
    fn field_text_coerces_scalars_only() {
        let doc = json!({"s": "x", "n": 12, "b": false, "o": {"a": 1}, "z": null});
        assert_eq!(field_text(&doc, "s").as_deref(), Some("x"));
        assert_eq!(field_text(&doc, "n").as_deref(), Some("12"));
        assert_eq!(field_text(&doc, "b").as_deref(), Some("false"));
        assert_eq!(field_text(&doc, "o"), None);
        assert_eq!(field_text(&doc, "z"), None);
        assert_eq!(field_text(&doc, "missing"), None);
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let config = RouterConfig {
            rules: vec![rule("ok"), rule("(unclosed")],
        };
        let err = Router::new(&config).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { index: 1, .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn exact_alternation_is_grouped() {
        let mut exact = rule("A|B");
        exact.exact = true;
        let router = Router::new(&RouterConfig { rules: vec![exact] }).unwrap();
        assert_eq!(router.classify(&[json!({"subject": "xA"})]), None);
        assert_eq!(router.classify(&[json!({"subject": "x B"})]), Some(0));
    }
}
