//! Factory registry for stage types.

use super::{PipelineBean, StageAssembler, StageBean};
use crate::config::{PipelineConfiguration, StageConfig};
use crate::errors::PipelineError;
use crate::stages::{NoOpStage, Stage};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Factory function type for creating stages from their configuration.
pub type StageFactory = Box<dyn Fn(&StageConfig) -> Box<dyn Stage> + Send + Sync>;

/// Registry of stage factories keyed by stage name.
#[derive(Default)]
pub struct StageRegistry {
    factories: RwLock<HashMap<String, StageFactory>>,
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stage_names", &self.stage_names())
            .finish()
    }
}

impl StageRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the stages shipped in this crate.
    #[must_use]
    pub fn with_builtin_stages() -> Self {
        let registry = Self::new();
        registry.register("noop", |_| NoOpStage::default());
        #[cfg(feature = "http")]
        registry.register(crate::stages::http::HttpClientDestination::STAGE_NAME, |_| {
            crate::stages::http::HttpClientDestination::new()
        });
        registry
    }

    /// Registers a boxed factory, replacing any previous one for the name.
    pub fn register_factory(&self, stage_name: impl Into<String>, factory: StageFactory) {
        self.factories.write().insert(stage_name.into(), factory);
    }

    /// Registers a factory for a concrete stage type.
    pub fn register<S, F>(&self, stage_name: impl Into<String>, factory: F)
    where
        S: Stage + 'static,
        F: Fn(&StageConfig) -> S + Send + Sync + 'static,
    {
        self.register_factory(stage_name, Box::new(move |config| Box::new(factory(config))));
    }

    /// Checks if a stage name is registered.
    #[must_use]
    pub fn contains(&self, stage_name: &str) -> bool {
        self.factories.read().contains_key(stage_name)
    }

    /// Lists registered stage names, sorted.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds a single stage.
    pub fn create(&self, config: &StageConfig) -> Result<Box<dyn Stage>, PipelineError> {
        let factories = self.factories.read();
        let factory = factories.get(&config.stage_name).ok_or_else(|| {
            PipelineError::stage_config(
                &config.instance_name,
                format!("unknown stage '{}'", config.stage_name),
            )
        })?;
        Ok(factory(config))
    }
}

impl StageAssembler for StageRegistry {
    fn assemble(&self, config: &PipelineConfiguration) -> Result<PipelineBean, PipelineError> {
        config.validate()?;
        if config.stages.is_empty() {
            return Err(PipelineError::config(format!(
                "pipeline '{}' has no stages",
                config.name
            )));
        }

        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(config.stages.len());
        for stage_config in &config.stages {
            if !seen.insert(stage_config.instance_name.as_str()) {
                return Err(PipelineError::stage_config(
                    &stage_config.instance_name,
                    "duplicate stage instance name",
                ));
            }
            let stage = self.create(stage_config)?;
            stages.push(StageBean::boxed(stage_config.clone(), stage));
        }

        Ok(PipelineBean {
            config: config.clone(),
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;

    fn config(stages: &[(&str, &str)]) -> PipelineConfiguration {
        stages
            .iter()
            .fold(PipelineConfiguration::new("orders"), |c, (instance, name)| {
                c.with_stage(StageConfig::new(*instance, *name))
            })
    }

    #[test]
    fn test_assemble_preserves_order() {
        let registry = StageRegistry::new();
        registry.register("source", |_| NoOpStage::new(StageKind::Source));
        registry.register("sink", |_| NoOpStage::new(StageKind::Destination));

        let bean = registry
            .assemble(&config(&[("src", "source"), ("a", "sink"), ("b", "sink")]))
            .unwrap();

        let names: Vec<_> = bean.stages.iter().map(|s| s.config.instance_name.as_str()).collect();
        assert_eq!(names, vec!["src", "a", "b"]);
        assert_eq!(bean.stages[0].stage.kind(), StageKind::Source);
        assert_eq!(bean.len(), 3);
    }

    #[test]
    fn test_unknown_stage_name() {
        let registry = StageRegistry::new();
        let err = registry.assemble(&config(&[("src", "kafka")])).unwrap_err();

        assert_eq!(err.stage(), Some("src"));
        assert!(err.to_string().contains("unknown stage 'kafka'"));
    }

    #[test]
    fn test_empty_and_duplicate_rejected() {
        let registry = StageRegistry::with_builtin_stages();

        assert!(registry.assemble(&config(&[])).is_err());

        let err = registry
            .assemble(&config(&[("x", "noop"), ("x", "noop")]))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate stage instance name"));
    }

    #[test]
    fn test_factory_sees_stage_config() {
        let registry = StageRegistry::new();
        registry.register("kind_from_config", |config: &StageConfig| {
            if config.get("source").and_then(serde_json::Value::as_bool) == Some(true) {
                NoOpStage::new(StageKind::Source)
            } else {
                NoOpStage::new(StageKind::Processor)
            }
        });

        let stage = registry
            .create(
                &StageConfig::new("s", "kind_from_config").with_value("source", serde_json::json!(true)),
            )
            .unwrap();
        assert_eq!(stage.kind(), StageKind::Source);
        assert!(registry.contains("kind_from_config"));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_builtin_stages() {
        let registry = StageRegistry::with_builtin_stages();
        assert_eq!(registry.stage_names(), vec!["http_client".to_string(), "noop".to_string()]);
    }
}
