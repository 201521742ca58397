//! # equivalency
//!
//! Decide whether a document reported by a remote system differs from the
//! document a user declared, when the remote side:
//!
//! - reorders object keys,
//! - fills in empty arrays/objects for fields the user never set,
//! - reorders the elements of set-like arrays (environment variables, ...).
//!
//! Plain deep equality reports perpetual drift in those cases. The
//! [`Comparator`] normalizes both sides first:
//!
//! 1. every key whose value is an empty array or empty object is removed,
//!    at any depth;
//! 2. arrays under a designated *unordered* key are compared as multisets;
//! 3. everything else compares structurally, array order significant.
//!
//! ## Example
//!
//! ```
//! use equivalency::Comparator;
//!
//! let comparator = Comparator::new(["environment"]);
//! let desired = r#"{"image": "busybox", "environment": [{"name": "A"}, {"name": "B"}]}"#;
//! let remote = r#"{"environment": [{"name": "B"}, {"name": "A"}], "image": "busybox", "volumes": []}"#;
//! assert!(comparator.equivalent(desired, remote).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Errors from document comparison.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One side is not well-formed JSON.
    #[error("malformed {side} document: {source}")]
    Malformed {
        /// Which input failed to parse.
        side: Side,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for comparisons.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two compared documents an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The user's declared document.
    Desired,
    /// The document reported by the remote system.
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desired => write!(f, "desired"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Structural comparator with a configurable set of order-insensitive keys.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    unordered: BTreeSet<String>,
}

impl Comparator {
    /// Create a comparator treating arrays under `unordered` keys as multisets.
    pub fn new<I, S>(unordered: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unordered: unordered.into_iter().map(Into::into).collect(),
        }
    }

    /// Comparator for container property documents (`environment` unordered).
    #[must_use]
    pub fn container_properties() -> Self {
        Self::new(["environment"])
    }

    /// Keys compared as multisets.
    pub fn unordered_keys(&self) -> impl Iterator<Item = &str> {
        self.unordered.iter().map(String::as_str)
    }

    /// Compare two JSON texts.
    ///
    /// Blank input is read as an empty document, so two blank inputs are
    /// equivalent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] when either side does not parse.
    pub fn equivalent(&self, desired: &str, remote: &str) -> Result<bool> {
        let desired = parse_document(desired, Side::Desired)?;
        let remote = parse_document(remote, Side::Remote)?;
        Ok(self.equivalent_values(&desired, &remote))
    }

    /// Compare two already-parsed documents.
    #[must_use]
    pub fn equivalent_values(&self, desired: &Value, remote: &Value) -> bool {
        self.normalize(desired) == self.normalize(remote)
    }

    /// Normalized form of a document: empty collections dropped, unordered
    /// arrays sorted into a canonical order.
    #[must_use]
    pub fn normalize(&self, value: &Value) -> Value {
        self.normalize_value(value, false)
    }

    fn normalize_value(&self, value: &Value, unordered: bool) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child = self.normalize_value(child, self.unordered.contains(key));
                    if !is_empty_collection(&child) {
                        out.insert(key.clone(), child);
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                let mut items: Vec<Value> = items
                    .iter()
                    .map(|item| self.normalize_value(item, false))
                    .collect();
                if unordered {
                    items.sort_by_cached_key(canonical);
                }
                Value::Array(items)
            }
            scalar => scalar.clone(),
        }
    }
}

/// Compare with the container-properties comparator.
///
/// # Errors
///
/// Returns [`Error::Malformed`] when either side does not parse.
pub fn equivalent(desired: &str, remote: &str) -> Result<bool> {
    Comparator::container_properties().equivalent(desired, remote)
}

/// Parse one side of a comparison, reading blank input as an empty document.
///
/// # Errors
///
/// Returns [`Error::Malformed`] tagged with `side` when `text` does not parse.
pub fn parse_document(text: &str, side: Side) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(text).map_err(|source| Error::Malformed { side, source })
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Key-sorted serialization used to order multiset elements.
fn canonical(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", body.join(","))
        }
        scalar => scalar.to_string(),
    }
}

#[cfg(test)]
mod tests;
