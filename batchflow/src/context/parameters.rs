//! Pipeline-wide runtime parameters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// String-keyed parameters shared by every stage of a pipeline.
///
/// Supplied once at pipeline construction and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeParameters {
    values: HashMap<String, serde_json::Value>,
}

impl RuntimeParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    /// Gets a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(serde_json::Value::as_str)
    }

    /// Gets a value deserialized into `T`.
    ///
    /// Returns `None` when the key is absent or the value does not fit `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, serde_json::Value>> for RuntimeParameters {
    fn from(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = RuntimeParameters::new()
            .with("env", serde_json::json!("staging"))
            .with("retries", serde_json::json!(3));

        assert_eq!(params.get_str("env"), Some("staging"));
        assert_eq!(params.get_as::<u32>("retries"), Some(3));
        assert_eq!(params.get_as::<u32>("env"), None);
        assert!(params.get("missing").is_none());
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let params = RuntimeParameters::new().with("a", serde_json::json!(1));
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"a": 1})
        );
    }
}
