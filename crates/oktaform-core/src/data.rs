use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Flat attribute map for one resource, plus the remote ID once known.
///
/// Used for both the declared (desired) image and the observed state.
/// An attribute holding `null` is treated the same as an absent one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            attributes: Map::new(),
        }
    }

    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self {
            id: None,
            attributes,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn require_id(&self) -> Result<&str, CoreError> {
        self.id().ok_or(CoreError::MissingId)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Required string attribute; the schema guarantees presence for
    /// `Required` attributes, so absence here means a caller bug or a
    /// hand-edited state file.
    pub fn require_str(&self, key: &str) -> Result<&str, CoreError> {
        self.get_str(key)
            .ok_or_else(|| CoreError::MissingField(key.to_string()))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_list(key)
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    }

    pub fn get_string_set(&self, key: &str) -> BTreeSet<String> {
        self.get_list(key)
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Set when `Some`, clear when `None`.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        match value {
            Some(v) => self.set(key, v),
            None => self.clear(key),
        }
    }

    pub fn set_strings<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = values
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.set(key, Value::Array(list));
    }

    pub fn clear(&mut self, key: &str) {
        self.attributes.remove(key);
    }

    /// Copy `keys` from `other` when this image lacks them.
    ///
    /// Used for write-only attributes (secrets, request flags) that the
    /// API never echoes back.
    pub fn carry_over(&mut self, other: &ResourceData, keys: &[&str]) {
        for key in keys {
            if !self.has(key) {
                if let Some(v) = other.get(key) {
                    self.set(key, v.clone());
                }
            }
        }
    }
}
