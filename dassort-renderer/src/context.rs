//! Per-group variable mapping used to render destination paths.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::RenderError;
use crate::template::{self, Variables};

/// Name → value mapping for one group.
///
/// Built fresh for every group (seed from defaults, then overlay); never
/// carried from one group to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PathContext {
    values: BTreeMap<String, Value>,
}

impl PathContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context from `(name, default)` pairs.
    pub fn seeded<'a>(defaults: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        Self {
            values: defaults
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Render `template` against this context.
    pub fn render(&self, template: &str) -> Result<String, RenderError> {
        template::render(template, self)
    }
}

impl Variables for PathContext {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}
