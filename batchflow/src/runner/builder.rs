//! Fluent pipeline construction.

use super::{InMemoryOffsetTracker, Pipeline, SourceOffsetTracker};
use crate::cancellation::StopHandle;
use crate::config::PipelineConfiguration;
use crate::context::RuntimeParameters;
use crate::creation::StageAssembler;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use std::sync::Arc;

/// Builder for creating pipelines from configuration.
pub struct PipelineBuilder {
    config: PipelineConfiguration,
    runtime_parameters: RuntimeParameters,
    offset_tracker: Option<Box<dyn SourceOffsetTracker>>,
    event_sink: Option<Arc<dyn EventSink>>,
    stop_handle: Option<StopHandle>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("runtime_parameters", &self.runtime_parameters)
            .field("has_offset_tracker", &self.offset_tracker.is_some())
            .field("has_event_sink", &self.event_sink.is_some())
            .field("stop_handle", &self.stop_handle)
            .finish()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(config: PipelineConfiguration) -> Self {
        Self {
            config,
            runtime_parameters: RuntimeParameters::new(),
            offset_tracker: None,
            event_sink: None,
            stop_handle: None,
        }
    }

    /// Adds a runtime parameter.
    #[must_use]
    pub fn runtime_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.runtime_parameters.insert(key, value);
        self
    }

    /// Replaces all runtime parameters.
    #[must_use]
    pub fn runtime_parameters(mut self, parameters: RuntimeParameters) -> Self {
        self.runtime_parameters = parameters;
        self
    }

    /// Sets the offset tracker. Defaults to an in-memory tracker.
    #[must_use]
    pub fn offset_tracker(mut self, tracker: impl SourceOffsetTracker + 'static) -> Self {
        self.offset_tracker = Some(Box::new(tracker));
        self
    }

    /// Sets the event sink. Defaults to discarding events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Shares an existing stop handle with the pipeline.
    #[must_use]
    pub fn stop_handle(mut self, handle: StopHandle) -> Self {
        self.stop_handle = Some(handle);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the number of configured stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.config.stages.len()
    }

    /// Assembles the stages and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigResolution`] if assembly fails.
    pub fn build<A>(self, assembler: &A) -> Result<Pipeline, PipelineError>
    where
        A: StageAssembler + ?Sized,
    {
        let bean = assembler.assemble(&self.config)?;
        if bean.len() != self.config.stages.len() {
            return Err(PipelineError::config(format!(
                "assembler produced {} stages for {} configured",
                bean.len(),
                self.config.stages.len()
            )));
        }

        let tracker = self
            .offset_tracker
            .unwrap_or_else(|| Box::new(InMemoryOffsetTracker::new()));
        let sink = self.event_sink.unwrap_or_else(|| Arc::new(NoOpEventSink));

        let pipeline = Pipeline::new(bean, self.runtime_parameters, tracker)?.with_event_sink(sink);
        Ok(match self.stop_handle {
            Some(handle) => pipeline.with_stop_handle(handle),
            None => pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::creation::StageRegistry;

    fn config() -> PipelineConfiguration {
        PipelineConfiguration::new("builder")
            .with_batch_size(8)
            .with_stage(StageConfig::new("a", "noop"))
            .with_stage(StageConfig::new("b", "noop"))
    }

    #[test]
    fn test_build_with_defaults() {
        let builder = PipelineBuilder::new(config()).runtime_parameter("env", serde_json::json!("dev"));
        assert_eq!(builder.name(), "builder");
        assert_eq!(builder.stage_count(), 2);

        let pipeline = builder.build(&StageRegistry::with_builtin_stages()).unwrap();

        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);
        assert_eq!(pipeline.batch_size(), 8);
        assert_eq!(pipeline.offset(), None);
        let params = pipeline.pipes()[1].runtime().context().runtime_parameters();
        assert_eq!(params.get_str("env"), Some("dev"));
    }

    #[test]
    fn test_build_with_seeded_tracker() {
        let pipeline = PipelineBuilder::new(config())
            .offset_tracker(InMemoryOffsetTracker::with_offset("5"))
            .build(&StageRegistry::with_builtin_stages())
            .unwrap();

        assert_eq!(pipeline.offset(), Some("5".to_string()));
    }

    #[test]
    fn test_build_with_shared_stop_handle() {
        let handle = StopHandle::new();
        let pipeline = PipelineBuilder::new(config())
            .stop_handle(handle.clone())
            .build(&StageRegistry::with_builtin_stages())
            .unwrap();

        handle.stop();
        assert!(pipeline.is_stop_requested());
    }

    #[test]
    fn test_assembly_failure_propagates() {
        let err = PipelineBuilder::new(config())
            .build(&StageRegistry::new())
            .unwrap_err();

        assert!(matches!(err, PipelineError::ConfigResolution { .. }));
        assert_eq!(err.stage(), Some("a"));
    }
}
