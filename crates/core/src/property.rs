//! Property bags attached to nodes and relationships

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single key/value property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered property mapping. Insertion order is preserved and re-inserting an
/// existing key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(IndexMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a property, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder: add a property
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Properties as an ordered list of pairs
    pub fn to_list(&self) -> Vec<Property> {
        self.iter().map(|(k, v)| Property::new(k, v)).collect()
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Property>> for Properties {
    fn from(list: Vec<Property>) -> Self {
        list.into_iter().map(|p| (p.key, p.value)).collect()
    }
}

/// A property as a model emits it; values are not always strings
#[derive(Debug, Clone, Deserialize)]
pub struct RawProperty {
    #[serde(alias = "name")]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// Property bag as it arrives from extraction: a list of key/value pairs or
/// an already-flattened mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawProperties {
    List(Vec<RawProperty>),
    Map(IndexMap<String, Value>),
}

impl Default for RawProperties {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl RawProperties {
    /// Flatten into the canonical ordered mapping. Keys are kept as given;
    /// key normalization happens in the normalizer.
    pub fn into_properties(self) -> Properties {
        match self {
            RawProperties::List(items) => items
                .into_iter()
                .map(|p| (p.key, value_to_string(&p.value)))
                .collect(),
            RawProperties::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, value_to_string(&v)))
                .collect(),
        }
    }
}

/// Render a JSON value as a property string
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
