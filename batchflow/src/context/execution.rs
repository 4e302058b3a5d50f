//! The execution context handed to a stage.

use super::RuntimeParameters;
use crate::config::StageConfig;
use crate::core::{Issue, Severity, StageKind};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Per-stage context, built once and reused for every batch cycle.
///
/// Passed explicitly to [`Stage::init`](crate::stages::Stage::init) and
/// [`Stage::process`](crate::stages::Stage::process).
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Name of the owning pipeline.
    pipeline_name: String,
    /// The stage's own configuration.
    stage_config: StageConfig,
    /// The stage's role in the dataflow.
    kind: StageKind,
    /// Parameters shared by every stage of the pipeline.
    runtime_parameters: Arc<RuntimeParameters>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        pipeline_name: impl Into<String>,
        stage_config: StageConfig,
        kind: StageKind,
        runtime_parameters: Arc<RuntimeParameters>,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            stage_config,
            kind,
            runtime_parameters,
        }
    }

    /// Returns the stage instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        &self.stage_config.instance_name
    }

    /// Returns the stage type name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_config.stage_name
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Returns the raw stage configuration.
    #[must_use]
    pub fn config(&self) -> &StageConfig {
        &self.stage_config
    }

    /// Returns the pipeline runtime parameters.
    #[must_use]
    pub fn runtime_parameters(&self) -> &RuntimeParameters {
        &self.runtime_parameters
    }

    /// Deserializes the stage configuration into a typed struct.
    ///
    /// # Errors
    ///
    /// Returns an error-severity issue attributed to this stage when the
    /// configuration does not match `T`.
    pub fn typed_config<T: DeserializeOwned>(&self) -> Result<T, Issue> {
        self.stage_config
            .typed()
            .map_err(|e| self.error_issue(format!("Invalid configuration: {e}")))
    }

    /// Creates an issue attributed to this stage.
    #[must_use]
    pub fn issue(&self, severity: Severity, message: impl Into<String>) -> Issue {
        Issue::new(severity, self.instance_name(), message)
    }

    /// Creates an error-severity issue attributed to this stage.
    #[must_use]
    pub fn error_issue(&self, message: impl Into<String>) -> Issue {
        self.issue(Severity::Error, message)
    }
}
