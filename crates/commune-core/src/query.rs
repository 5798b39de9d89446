//! In-memory document query.
//!
//! A chainable filter over a borrowed snapshot of `{partialId -> data}`
//! entries, used by the in-memory adapter in place of a database query
//! engine. Each filter consumes the query and collects the surviving entries
//! into a fresh map, so the snapshot itself is never touched and a query
//! cannot be reused once executed.
//!
//! The property `"id"` is not a stored field: it refers to the entry's
//! partial identifier. Entries that lack a filtered property, or whose value
//! is not a string under a regex filter, are dropped rather than reported.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

/// Property name that addresses the entry's partial identifier.
pub const ID_PROPERTY: &str = "id";

pub struct DocumentQuery<'a> {
    entries: BTreeMap<&'a str, &'a Value>,
}

impl<'a> DocumentQuery<'a> {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Keep entries whose `property` equals `value`.
    pub fn where_equals(self, property: &str, value: &Value) -> Self {
        self.retain(|id, data| {
            if property == ID_PROPERTY {
                return value.as_str() == Some(id);
            }
            match data.get(property) {
                Some(found) => found == value,
                None => {
                    tracing::trace!(property, partial_id = id, "property missing, entry dropped");
                    false
                }
            }
        })
    }

    /// Keep entries whose string `property` matches `pattern`.
    pub fn where_regex(self, property: &str, pattern: &Regex) -> Self {
        self.retain(|id, data| {
            if property == ID_PROPERTY {
                return pattern.is_match(id);
            }
            match data.get(property) {
                Some(Value::String(found)) => pattern.is_match(found),
                Some(_) => {
                    tracing::trace!(property, partial_id = id, "non-string property, entry dropped");
                    false
                }
                None => false,
            }
        })
    }

    /// Matching entries in identifier order.
    pub fn execute(self) -> Vec<(&'a str, &'a Value)> {
        self.entries.into_iter().collect()
    }

    fn retain(self, keep: impl Fn(&str, &Value) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .into_iter()
                .filter(|(id, data)| keep(id, data))
                .collect(),
        }
    }
}
