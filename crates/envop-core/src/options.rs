//! Opaque service options passed through to custom resources
//!
//! Options are an ordered map of scalar-or-nested values. The only values that
//! cannot be represented on the wire are non-finite floats (NaN, +/-inf); use
//! [`Options::non_representable`] to locate them before encoding.
//!
//! Integers that do not fit in `i64` are kept as `Unsigned` rather than being
//! rounded through `f64`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Key marking a non-finite float in the JSON form of options
const FLOAT_MARKER: &str = "$float";

fn escape_key(key: &str) -> String {
    if key.starts_with('$') {
        format!("${}", key)
    } else {
        key.to_string()
    }
}

fn map_to_json(map: &IndexMap<String, OptionValue>) -> JsonValue {
    JsonValue::Object(
        map.iter()
            .map(|(k, v)| (escape_key(k), v.to_json()))
            .collect(),
    )
}

/// A single option value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    List(Vec<OptionValue>),
    Map(IndexMap<String, OptionValue>),
}

impl OptionValue {
    /// Convert to a JSON value for comparison
    ///
    /// Non-finite floats have no JSON number form and are rendered as
    /// `{"$float": "<value>"}`. Map keys starting with `$` get one more `$`, so
    /// that marker cannot be produced by any other option value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            OptionValue::Null => JsonValue::Null,
            OptionValue::Bool(b) => JsonValue::Bool(*b),
            OptionValue::Integer(i) => JsonValue::from(*i),
            OptionValue::Unsigned(u) => JsonValue::from(*u),
            OptionValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| {
                    let mut tagged = serde_json::Map::new();
                    tagged.insert(FLOAT_MARKER.to_string(), JsonValue::String(f.to_string()));
                    JsonValue::Object(tagged)
                }),
            OptionValue::String(s) => JsonValue::String(s.clone()),
            OptionValue::List(items) => {
                JsonValue::Array(items.iter().map(OptionValue::to_json).collect())
            }
            OptionValue::Map(map) => map_to_json(map),
        }
    }

    fn find_non_finite(&self, path: &str) -> Option<String> {
        match self {
            OptionValue::Float(f) if !f.is_finite() => Some(path.to_string()),
            OptionValue::List(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| v.find_non_finite(&format!("{}[{}]", path, i))),
            OptionValue::Map(map) => map
                .iter()
                .find_map(|(k, v)| v.find_non_finite(&format!("{}.{}", path, k))),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::String(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::String(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> Self {
        OptionValue::Integer(i)
    }
}

impl From<u64> for OptionValue {
    fn from(u: u64) -> Self {
        OptionValue::Unsigned(u)
    }
}

impl From<f64> for OptionValue {
    fn from(f: f64) -> Self {
        OptionValue::Float(f)
    }
}

/// Ordered key-value options attached to a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(pub IndexMap<String, OptionValue>);

impl Options {
    /// Create empty options
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert an option, replacing any previous value under the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get an option by key
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Iterate options in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a JSON object
    pub fn to_json(&self) -> JsonValue {
        map_to_json(&self.0)
    }

    /// Dotted path of the first value that cannot be encoded, if any
    pub fn non_representable(&self) -> Option<String> {
        self.0.iter().find_map(|(k, v)| v.find_non_finite(k))
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
