//! Recursive key lookup over decoded descriptors.
//!
//! [`KeySearch`] walks a JSON value depth-first with an explicit stack and
//! yields every value bound to the key, at any depth. Object entries are
//! visited in document order; a matching entry is yielded before the search
//! descends into its value.

use serde_json::Value;

enum Frame<'a> {
    Object(serde_json::map::Iter<'a>),
    Array(std::slice::Iter<'a, Value>),
}

/// Lazy iterator over all values bound to `key` inside a JSON value.
///
/// Create a fresh `KeySearch` to restart the walk.
pub struct KeySearch<'a> {
    key: &'a str,
    stack: Vec<Frame<'a>>,
}

impl<'a> KeySearch<'a> {
    pub fn new(key: &'a str, root: &'a Value) -> Self {
        let mut search = Self {
            key,
            stack: Vec::new(),
        };
        search.descend(root);
        search
    }

    fn descend(&mut self, value: &'a Value) {
        match value {
            Value::Object(map) => self.stack.push(Frame::Object(map.iter())),
            Value::Array(items) => self.stack.push(Frame::Array(items.iter())),
            _ => {}
        }
    }
}

impl<'a> Iterator for KeySearch<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = match self.stack.last_mut()? {
                Frame::Object(entries) => entries.next().map(|(k, v)| (Some(k), v)),
                Frame::Array(items) => items.next().map(|v| (None, v)),
            };
            match next {
                None => {
                    self.stack.pop();
                }
                Some((key, value)) => {
                    self.descend(value);
                    if key.map(String::as_str) == Some(self.key) {
                        return Some(value);
                    }
                }
            }
        }
    }
}

/// First value bound to `key`, or `default` when the key appears nowhere.
pub fn first_or<'a>(key: &'a str, root: &'a Value, default: &'a Value) -> &'a Value {
    KeySearch::new(key, root).next().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_values_at_every_depth_in_order() {
        let doc = json!({
            "subject": "top",
            "sessions": [
                {"subject": "first", "meta": {"subject": "nested"}},
                {"other": 1},
                [{"subject": "list-in-list"}]
            ],
            "tail": {"subject": "last"}
        });
        let found: Vec<_> = KeySearch::new("subject", &doc).cloned().collect();
        assert_eq!(
            found,
            vec![
                json!("top"),
                json!("first"),
                json!("nested"),
                json!("list-in-list"),
                json!("last")
            ]
        );
    }

    #[test]
    fn top_level_and_nested_lists_are_searched() {
        let doc = json!([[{"subject": "deep"}], {"subject": "flat"}]);
        let found: Vec<_> = KeySearch::new("subject", &doc).cloned().collect();
        assert_eq!(found, vec![json!("deep"), json!("flat")]);
    }

    #[test]
    fn match_is_yielded_before_its_children() {
        let doc = json!({"k": {"k": "inner"}});
        let found: Vec<_> = KeySearch::new("k", &doc).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], &json!({"k": "inner"}));
        assert_eq!(found[1], &json!("inner"));
    }

    #[test]
    fn absent_key_falls_back_to_default() {
        let doc = json!({"a": [1, 2, {"b": null}]});
        let default = json!("fallback");
        assert_eq!(first_or("subject", &doc, &default), &default);
        assert_eq!(KeySearch::new("subject", &doc).count(), 0);
    }

    #[test]
    fn scalars_and_null_roots_yield_nothing() {
        assert_eq!(KeySearch::new("k", &json!("k")).count(), 0);
        assert_eq!(KeySearch::new("k", &Value::Null).count(), 0);
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut doc = json!({"needle": "bottom"});
        for _ in 0..10_000 {
            doc = json!({ "level": doc });
        }
        assert_eq!(first_or("needle", &doc, &Value::Null), &json!("bottom"));
        // Dropping a 10k-deep serde_json::Value recurses; leak it instead.
        std::mem::forget(doc);
    }
}
