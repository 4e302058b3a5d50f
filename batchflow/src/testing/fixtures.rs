//! Test fixtures for pipeline testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{PipelineConfiguration, StageConfig};
use crate::context::{RuntimeParameters, StageContext};
use crate::core::StageKind;
use crate::creation::{PipelineBean, StageBean};
use crate::errors::{OffsetError, PipelineError};
use crate::runner::{Pipeline, SourceOffsetTracker};
use crate::stages::Stage;

/// A test context builder.
#[derive(Debug, Default)]
pub struct TestContext {
    /// Pipeline name for the context.
    pub pipeline_name: Option<String>,
    /// Stage configuration values.
    pub config: Vec<(String, serde_json::Value)>,
    /// Runtime parameters.
    pub parameters: RuntimeParameters,
}

impl TestContext {
    /// Creates a new test context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = Some(name.into());
        self
    }

    /// Adds a stage configuration value.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.push((key.into(), value));
        self
    }

    /// Adds a runtime parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Builds a `StageContext` for a stage instance.
    #[must_use]
    pub fn build_stage_context(&self, instance_name: &str, kind: StageKind) -> StageContext {
        let config = self
            .config
            .iter()
            .fold(StageConfig::new(instance_name, "test"), |c, (k, v)| {
                c.with_value(k.clone(), v.clone())
            });
        StageContext::new(
            self.pipeline_name.as_deref().unwrap_or("test"),
            config,
            kind,
            Arc::new(self.parameters.clone()),
        )
    }
}

/// A shared record of every offset committed to a tracker.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    offsets: Arc<Mutex<Vec<Option<String>>>>,
}

impl CommitLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, offset: Option<String>) {
        self.offsets.lock().push(offset);
    }

    /// Returns committed offsets in order.
    #[must_use]
    pub fn offsets(&self) -> Vec<Option<String>> {
        self.offsets.lock().clone()
    }

    /// Returns the number of commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.lock().len()
    }

    /// Returns true if nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.lock().is_empty()
    }
}

/// An in-memory tracker that records its commits.
///
/// Finishes when a commit carries end of data, like
/// [`InMemoryOffsetTracker`](crate::runner::InMemoryOffsetTracker).
#[derive(Debug, Clone, Default)]
pub struct RecordingOffsetTracker {
    offset: Option<String>,
    finished: bool,
    log: CommitLog,
}

impl RecordingOffsetTracker {
    /// Creates a tracker with no committed offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the commit log.
    #[must_use]
    pub fn log(&self) -> CommitLog {
        self.log.clone()
    }
}

#[async_trait]
impl SourceOffsetTracker for RecordingOffsetTracker {
    async fn is_finished(&self) -> Result<bool, OffsetError> {
        Ok(self.finished)
    }

    fn offset(&self) -> Option<String> {
        self.offset.clone()
    }

    async fn commit(&mut self, offset: Option<String>, end_of_data: bool) -> Result<(), OffsetError> {
        self.log.push(offset.clone());
        self.offset = offset;
        self.finished = end_of_data;
        Ok(())
    }
}

/// A tracker that reports finished after a fixed number of commits.
///
/// Ignores the source's end-of-data flag.
#[derive(Debug, Clone)]
pub struct CycleLimitTracker {
    limit: usize,
    offset: Option<String>,
    log: CommitLog,
}

impl CycleLimitTracker {
    /// Creates a tracker that finishes after `limit` commits.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            offset: None,
            log: CommitLog::new(),
        }
    }

    /// Returns a handle to the commit log.
    #[must_use]
    pub fn log(&self) -> CommitLog {
        self.log.clone()
    }
}

#[async_trait]
impl SourceOffsetTracker for CycleLimitTracker {
    async fn is_finished(&self) -> Result<bool, OffsetError> {
        Ok(self.log.len() >= self.limit)
    }

    fn offset(&self) -> Option<String> {
        self.offset.clone()
    }

    async fn commit(&mut self, offset: Option<String>, _end_of_data: bool) -> Result<(), OffsetError> {
        self.log.push(offset.clone());
        self.offset = offset;
        Ok(())
    }
}

/// A test pipeline builder that skips stage assembly.
#[derive(Debug)]
pub struct TestPipeline {
    config: PipelineConfiguration,
    stages: Vec<StageBean>,
    parameters: RuntimeParameters,
}

impl TestPipeline {
    /// Creates a new test pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: PipelineConfiguration::new(name),
            stages: Vec::new(),
            parameters: RuntimeParameters::new(),
        }
    }

    /// Adds a stage instance.
    #[must_use]
    pub fn with_stage(self, instance_name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        self.with_configured_stage(StageConfig::new(instance_name, "test"), stage)
    }

    /// Adds a stage instance with its own configuration values.
    #[must_use]
    pub fn with_configured_stage(mut self, config: StageConfig, stage: impl Stage + 'static) -> Self {
        self.config = self.config.with_stage(config.clone());
        self.stages.push(StageBean::new(config, stage));
        self
    }

    /// Sets the batch size hint.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config = self.config.with_batch_size(batch_size);
        self
    }

    /// Adds a runtime parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Returns the resolved stage list.
    #[must_use]
    pub fn bean(self) -> PipelineBean {
        PipelineBean {
            config: self.config,
            stages: self.stages,
        }
    }

    /// Builds the pipeline around `tracker`.
    pub fn build(self, tracker: impl SourceOffsetTracker + 'static) -> Result<Pipeline, PipelineError> {
        let Self {
            config,
            stages,
            parameters,
        } = self;
        Pipeline::new(PipelineBean { config, stages }, parameters, Box::new(tracker))
    }
}
