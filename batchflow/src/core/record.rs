//! Records carried through a batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single record flowing through the pipeline.
///
/// The engine never interprets `value`; stages serialize or transform it
/// as they see fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by the producing source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// The record payload.
    pub value: serde_json::Value,

    /// Free-form string attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl Record {
    /// Creates a record with the given payload.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            source_id: None,
            value,
            attributes: HashMap::new(),
        }
    }

    /// Sets the source id.
    #[must_use]
    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl From<serde_json::Value> for Record {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// A record a stage diverted out of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// The diverted record.
    pub record: Record,
    /// Instance name of the stage that diverted it.
    pub stage: String,
    /// Why the record was diverted.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builders() {
        let record = Record::new(serde_json::json!({"id": 7}))
            .with_source_id("file.csv::7")
            .with_attribute("topic", "orders");

        assert_eq!(record.source_id.as_deref(), Some("file.csv::7"));
        assert_eq!(record.attribute("topic"), Some("orders"));
        assert!(record.attribute("missing").is_none());
    }

    #[test]
    fn test_record_serialization_skips_empty_header() {
        let record = Record::from(serde_json::json!("plain"));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"value":"plain"}"#);
    }
}
