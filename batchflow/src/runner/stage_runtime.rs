//! Binds one stage instance to its context.

use super::PipeBatch;
use crate::context::{RuntimeParameters, StageContext};
use crate::core::{Issue, StageKind};
use crate::creation::StageBean;
use crate::errors::StageError;
use crate::stages::Stage;
use std::sync::Arc;

/// A configured stage paired with the context it runs under.
///
/// The context is built once here and lent to the stage on every call.
#[derive(Debug)]
pub struct StageRuntime {
    stage: Box<dyn Stage>,
    context: StageContext,
}

impl StageRuntime {
    /// Creates a runtime for an assembled stage.
    #[must_use]
    pub fn new(
        pipeline_name: &str,
        bean: StageBean,
        runtime_parameters: Arc<RuntimeParameters>,
    ) -> Self {
        let StageBean { config, stage } = bean;
        let context = StageContext::new(pipeline_name, config, stage.kind(), runtime_parameters);
        Self { stage, context }
    }

    /// Returns the stage's context.
    #[must_use]
    pub fn context(&self) -> &StageContext {
        &self.context
    }

    /// Returns the stage instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.context.instance_name()
    }

    /// Returns the stage's role.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.context.kind()
    }

    /// Initializes the stage, attributing any unattributed issues to it.
    pub async fn init(&mut self) -> Vec<Issue> {
        let mut issues = self.stage.init(&self.context).await;
        for issue in &mut issues {
            if issue.stage.is_empty() {
                issue.stage = self.context.instance_name().to_string();
            }
        }
        issues
    }

    /// Hands the batch to the stage.
    pub async fn process(&mut self, batch: &mut PipeBatch) -> Result<(), StageError> {
        self.stage.process(&self.context, batch).await
    }

    /// Releases the stage's resources.
    pub async fn destroy(&mut self) {
        self.stage.destroy().await;
    }
}
