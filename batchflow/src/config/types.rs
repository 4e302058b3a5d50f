//! Configuration types for pipelines and stages.

use crate::errors::PipelineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records requested from a source per batch when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Configuration for an entire pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfiguration {
    /// The pipeline name.
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Maximum number of records a source should emit per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Stage configurations, source first and destinations last.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_pipeline_name() -> String {
    "pipeline".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            batch_size: default_batch_size(),
            stages: Vec::new(),
        }
    }
}

impl PipelineConfiguration {
    /// Creates an empty configuration with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the configuration is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Appends a stage configuration.
    #[must_use]
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the batch size hint.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checks the pipeline-level settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the batch size is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::config(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("Batch size must be positive"));
        }
        Ok(())
    }
}

/// Configuration for a single stage instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Unique name of this instance within the pipeline.
    pub instance_name: String,
    /// Library the stage type comes from.
    #[serde(default)]
    pub library: String,
    /// The stage type identity used for assembly.
    pub stage_name: String,
    /// Named configuration values.
    #[serde(default, with = "config_list")]
    pub configuration: BTreeMap<String, serde_json::Value>,
}

impl StageConfig {
    /// Creates a stage configuration with no values.
    #[must_use]
    pub fn new(instance_name: impl Into<String>, stage_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            library: String::new(),
            stage_name: stage_name.into(),
            configuration: BTreeMap::new(),
        }
    }

    /// Sets the library.
    #[must_use]
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// Sets a configuration value, replacing any previous value for the key.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(name.into(), value);
        self
    }

    /// Returns a raw configuration value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.configuration.get(name)
    }

    /// Deserializes the configuration values into a typed struct.
    ///
    /// Keys map to field names, so stage structs usually carry
    /// `#[serde(rename = "conf.someKey")]` attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or a value has the wrong type.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .configuration
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
    }
}

/// Serializes the value map in the `[{"name": .., "value": ..}]` list form.
mod config_list {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    struct Entry<V> {
        name: String,
        value: V,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, serde_json::Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry<&serde_json::Value>> = map
            .iter()
            .map(|(name, value)| Entry {
                name: name.clone(),
                value,
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, serde_json::Value>, D::Error> {
        let entries = Vec::<Entry<serde_json::Value>>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for entry in entries {
            if map.contains_key(&entry.name) {
                return Err(D::Error::custom(format!(
                    "duplicate configuration key '{}'",
                    entry.name
                )));
            }
            map.insert(entry.name, entry.value);
        }
        Ok(map)
    }
}
