//! Lifecycle wrapper around a stage runtime.

use super::{PipeBatch, StageRuntime};
use crate::core::{Issue, PipeState, StageKind};
use crate::errors::PipelineError;
use tracing::{debug, info, warn};

/// The unit the pipeline iterates over.
///
/// Enforces `Uninitialized -> Initialized -> Processing -> Destroyed` and
/// turns stage failures into errors attributed to the stage and batch.
#[derive(Debug)]
pub struct StagePipe {
    runtime: StageRuntime,
    state: PipeState,
}

impl StagePipe {
    /// Wraps a runtime in a fresh, uninitialized pipe.
    #[must_use]
    pub fn new(runtime: StageRuntime) -> Self {
        Self {
            runtime,
            state: PipeState::Uninitialized,
        }
    }

    /// Returns the stage instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.runtime.instance_name()
    }

    /// Returns the stage's role.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.runtime.kind()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipeState {
        self.state
    }

    /// Returns the underlying runtime.
    #[must_use]
    pub fn runtime(&self) -> &StageRuntime {
        &self.runtime
    }

    /// Initializes the stage and returns its issues.
    ///
    /// A pipe that is not `Uninitialized` is left alone and reports a
    /// single error issue instead.
    pub async fn init(&mut self) -> Vec<Issue> {
        if self.state != PipeState::Uninitialized {
            warn!(stage = %self.instance_name(), state = %self.state, "Ignoring repeated init");
            return vec![Issue::error(
                self.instance_name(),
                format!("Cannot init stage while it is {}", self.state),
            )];
        }

        let issues = self.runtime.init().await;
        self.state = PipeState::Initialized;

        debug!(
            stage = %self.instance_name(),
            kind = %self.kind(),
            issues = issues.len(),
            "Stage initialized"
        );
        issues
    }

    /// Pushes one batch through the stage.
    pub async fn process(&mut self, batch: &mut PipeBatch) -> Result<(), PipelineError> {
        if !self.state.can_process() {
            return Err(self.lifecycle_error("process"));
        }
        self.state = PipeState::Processing;

        self.runtime.process(batch).await.map_err(|source| {
            warn!(
                stage = %self.instance_name(),
                batch = batch.batch_number(),
                error = %source,
                "Stage failed"
            );
            PipelineError::StageFailed {
                stage: self.instance_name().to_string(),
                batch: batch.batch_number(),
                offset: batch.previous_offset().map(String::from),
                source,
            }
        })
    }

    /// Releases the stage.
    ///
    /// The stage's own `destroy` only runs if it was initialized.
    pub async fn destroy(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipeState::Destroyed => return Err(self.lifecycle_error("destroy")),
            PipeState::Uninitialized => {}
            PipeState::Initialized | PipeState::Processing => self.runtime.destroy().await,
        }
        self.state = PipeState::Destroyed;
        info!(stage = %self.instance_name(), "Stage destroyed");
        Ok(())
    }

    fn lifecycle_error(&self, operation: &'static str) -> PipelineError {
        PipelineError::Lifecycle {
            stage: self.instance_name().to_string(),
            operation,
            state: self.state,
        }
    }
}
