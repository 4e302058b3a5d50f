//! Stage trait and built-in stages.
//!
//! Stages are the pluggable units of a batchflow pipeline: one source,
//! zero or more processors, one or more destinations.

#[cfg(feature = "http")]
pub mod http;

use crate::context::StageContext;
use crate::core::{Issue, StageKind};
use crate::errors::StageError;
use crate::runner::PipeBatch;
use async_trait::async_trait;
use std::fmt::Debug;

/// The capability contract every plugged-in stage satisfies.
///
/// The engine calls `init` once, `process` once per batch cycle, and
/// `destroy` once at shutdown. The batch is only borrowed for the duration
/// of a `process` call.
#[async_trait]
pub trait Stage: Send + Debug {
    /// Returns the role this stage plays.
    fn kind(&self) -> StageKind;

    /// Validates configuration and acquires resources.
    ///
    /// Problems are returned as issues, never as errors, so that every
    /// stage's problems surface in a single pass.
    async fn init(&mut self, _ctx: &StageContext) -> Vec<Issue> {
        Vec::new()
    }

    /// Processes one batch.
    ///
    /// Sources append records and advance the offset, processors filter or
    /// transform in place, destinations deliver the records.
    async fn process(&mut self, ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError>;

    /// Releases resources acquired in `init`.
    async fn destroy(&mut self) {}
}

/// A stage backed by a closure.
pub struct FnStage<F>
where
    F: FnMut(&StageContext, &mut PipeBatch) -> Result<(), StageError> + Send,
{
    kind: StageKind,
    func: F,
}

impl<F> FnStage<F>
where
    F: FnMut(&StageContext, &mut PipeBatch) -> Result<(), StageError> + Send,
{
    /// Creates a new function-based stage.
    pub fn new(kind: StageKind, func: F) -> Self {
        Self { kind, func }
    }

    /// Creates a processor stage.
    pub fn processor(func: F) -> Self {
        Self::new(StageKind::Processor, func)
    }
}

impl<F> Debug for FnStage<F>
where
    F: FnMut(&StageContext, &mut PipeBatch) -> Result<(), StageError> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("kind", &self.kind).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: FnMut(&StageContext, &mut PipeBatch) -> Result<(), StageError> + Send,
{
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn process(&mut self, ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError> {
        (self.func)(ctx, batch)
    }
}

/// A stage that leaves the batch untouched.
#[derive(Debug, Clone, Copy)]
pub struct NoOpStage {
    kind: StageKind,
}

impl NoOpStage {
    /// Creates a new no-op stage of the given kind.
    #[must_use]
    pub fn new(kind: StageKind) -> Self {
        Self { kind }
    }
}

impl Default for NoOpStage {
    fn default() -> Self {
        Self::new(StageKind::Processor)
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn process(&mut self, _ctx: &StageContext, _batch: &mut PipeBatch) -> Result<(), StageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::context::RuntimeParameters;
    use crate::core::Record;
    use std::sync::Arc;

    fn test_stage_context() -> StageContext {
        StageContext::new(
            "test",
            StageConfig::new("upper", "fn"),
            StageKind::Processor,
            Arc::new(RuntimeParameters::new()),
        )
    }

    #[tokio::test]
    async fn test_fn_stage_transforms_records() {
        let mut stage = FnStage::processor(|_ctx: &StageContext, batch: &mut PipeBatch| {
            for record in batch.records_mut() {
                if let Some(s) = record.value.as_str() {
                    record.value = serde_json::json!(s.to_uppercase());
                }
            }
            Ok(())
        });

        let ctx = test_stage_context();
        let mut batch = PipeBatch::new(None, 10, 1);
        batch.add_record(Record::new(serde_json::json!("a")));

        assert_eq!(stage.kind(), StageKind::Processor);
        assert!(stage.init(&ctx).await.is_empty());
        stage.process(&ctx, &mut batch).await.unwrap();

        assert_eq!(batch.records()[0].value, serde_json::json!("A"));
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let mut stage = NoOpStage::new(StageKind::Destination);
        let ctx = test_stage_context();
        let mut batch = PipeBatch::new(Some("7".to_string()), 10, 1);

        stage.process(&ctx, &mut batch).await.unwrap();
        stage.destroy().await;

        assert_eq!(stage.kind(), StageKind::Destination);
        assert!(batch.records().is_empty());
    }
}
