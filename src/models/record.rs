use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Business identifier that ties a source row to one destination record
/// across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    /// Separator between the parts of a composite key.
    pub const SEPARATOR: &'static str = "/";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the key from the values of `key_fields` in a destination
    /// payload. Returns `None` when any part is absent or empty.
    ///
    /// Reference values may come back from the destination as
    /// `[id, "display name"]` pairs; only the id takes part in the key, so a
    /// key built from a mapped record matches one built from a bulk read.
    pub fn from_fields<S: AsRef<str>>(
        fields: &Map<String, JsonValue>,
        key_fields: &[S],
    ) -> Option<Self> {
        let mut parts = Vec::with_capacity(key_fields.len());
        for field in key_fields {
            parts.push(key_part(fields.get(field.as_ref())?)?);
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join(Self::SEPARATOR)))
    }
}

fn key_part(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => Some(n.to_string()),
        },
        JsonValue::Array(items) => items.first().and_then(key_part),
        JsonValue::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NaturalKey {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl From<String> for NaturalKey {
    fn from(s: String) -> Self {
        Self(s.trim().to_string())
    }
}

/// Field payload sent to the destination store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationRecord(Map<String, JsonValue>);

impl DestinationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Copy of the payload without the given fields.
    pub fn without<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        let mut copy = self.0.clone();
        for field in fields {
            copy.remove(field.as_ref());
        }
        Self(copy)
    }

    pub fn natural_key<S: AsRef<str>>(&self, key_fields: &[S]) -> Option<NaturalKey> {
        NaturalKey::from_fields(&self.0, key_fields)
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, JsonValue> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, JsonValue>> for DestinationRecord {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}
