//! The pipeline run loop.

use super::{InMemoryOffsetTracker, PipeBatch, SourceOffsetTracker, StagePipe, StageRuntime};
use crate::cancellation::StopHandle;
use crate::context::RuntimeParameters;
use crate::core::{Issue, PipeState};
use crate::creation::PipelineBean;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a run loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The offset tracker reported the source exhausted.
    Finished,
    /// A stop was requested.
    Stopped,
}

/// Summary of one call to [`Pipeline::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Batches committed.
    pub batches: u64,
    /// Records that reached the end of the stage chain.
    pub records: u64,
    /// Records diverted to error lists.
    pub error_records: u64,
    /// Offset held by the tracker when the run ended.
    pub last_offset: Option<String>,
    /// Why the run ended.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl RunSummary {
    /// Returns true if the run ended because the source was exhausted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome == RunOutcome::Finished
    }

    /// Returns the wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// An ordered chain of stage pipes driven in batch cycles.
pub struct Pipeline {
    name: String,
    batch_size: usize,
    pipes: Vec<StagePipe>,
    offset_tracker: Box<dyn SourceOffsetTracker>,
    stop: StopHandle,
    event_sink: Arc<dyn EventSink>,
    terminated: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("batch_size", &self.batch_size)
            .field("pipes", &self.pipes)
            .field("offset", &self.offset_tracker.offset())
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Builds one runtime and pipe per assembled stage, in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigResolution`] if the bean has no
    /// stages, its configuration is invalid, or its stages do not match the
    /// configured stages one to one in order.
    pub fn new(
        bean: PipelineBean,
        runtime_parameters: RuntimeParameters,
        offset_tracker: Box<dyn SourceOffsetTracker>,
    ) -> Result<Self, PipelineError> {
        let PipelineBean { config, stages } = bean;
        config.validate()?;
        if stages.is_empty() {
            return Err(PipelineError::config(format!(
                "pipeline '{}' has no stages",
                config.name
            )));
        }
        if stages.len() != config.stages.len() {
            return Err(PipelineError::config(format!(
                "pipeline '{}' has {} stages for {} configured",
                config.name,
                stages.len(),
                config.stages.len()
            )));
        }
        if let Some((position, (bean, configured))) = stages
            .iter()
            .zip(&config.stages)
            .enumerate()
            .find(|(_, (bean, configured))| bean.config.instance_name != configured.instance_name)
        {
            return Err(PipelineError::config(format!(
                "pipeline '{}' stage {position} is '{}' but configuration expects '{}'",
                config.name, bean.config.instance_name, configured.instance_name
            )));
        }

        let runtime_parameters = Arc::new(runtime_parameters);
        let pipes = stages
            .into_iter()
            .map(|stage| {
                StagePipe::new(StageRuntime::new(
                    &config.name,
                    stage,
                    Arc::clone(&runtime_parameters),
                ))
            })
            .collect();

        Ok(Self {
            name: config.name,
            batch_size: config.batch_size,
            pipes,
            offset_tracker,
            stop: StopHandle::new(),
            event_sink: Arc::new(NoOpEventSink),
            terminated: false,
        })
    }

    /// Builds a pipeline with an in-memory offset tracker.
    pub fn in_memory(bean: PipelineBean, runtime_parameters: RuntimeParameters) -> Result<Self, PipelineError> {
        Self::new(bean, runtime_parameters, Box::new(InMemoryOffsetTracker::new()))
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Uses an existing stop handle, so one handle can stop several pipelines.
    #[must_use]
    pub fn with_stop_handle(mut self, handle: StopHandle) -> Self {
        self.stop = handle;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the batch size hint handed to every batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of pipes.
    #[must_use]
    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    /// Returns the pipes in execution order.
    #[must_use]
    pub fn pipes(&self) -> &[StagePipe] {
        &self.pipes
    }

    /// Returns stage instance names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.pipes.iter().map(|p| p.instance_name().to_string()).collect()
    }

    /// Returns the offset last committed to the tracker.
    #[must_use]
    pub fn offset(&self) -> Option<String> {
        self.offset_tracker.offset()
    }

    /// Initializes every stage in order and returns all of their issues.
    ///
    /// A stage reporting issues does not prevent later stages from being
    /// initialized.
    pub async fn init(&mut self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for pipe in &mut self.pipes {
            issues.extend(pipe.init().await);
        }

        let errors = issues.iter().filter(|i| i.is_error()).count();
        info!(
            pipeline = %self.name,
            stages = self.pipes.len(),
            issues = issues.len(),
            errors,
            "Pipeline initialized"
        );
        issues
    }

    /// Runs batch cycles until the source is exhausted or a stop is requested.
    ///
    /// Both conditions are checked only between cycles, so a batch in
    /// flight always reaches every stage. A stage failure abandons the
    /// batch without committing its offset.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StageFailed`] if a stage fails,
    /// [`PipelineError::Offset`] if the tracker fails, or
    /// [`PipelineError::Lifecycle`] if any stage is not initialized.
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        if let Some(pipe) = self.pipes.iter().find(|p| !p.state().can_process()) {
            return Err(PipelineError::Lifecycle {
                stage: pipe.instance_name().to_string(),
                operation: "run",
                state: pipe.state(),
            });
        }

        self.terminated = false;
        let result = self.run_cycles().await;
        self.terminated = true;
        result
    }

    async fn run_cycles(&mut self) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(pipeline = %self.name, %run_id, offset = ?self.offset(), "Pipeline run started");
        self.event_sink
            .emit(PipelineEvent::Started {
                pipeline: self.name.clone(),
                run_id,
                stages: self.stage_names(),
            })
            .await;

        let mut batches = 0u64;
        let mut records = 0u64;
        let mut error_records = 0u64;

        let outcome = loop {
            if self.stop.is_stopped() {
                break RunOutcome::Stopped;
            }
            if self.offset_tracker.is_finished().await? {
                break RunOutcome::Finished;
            }

            let mut batch = PipeBatch::new(self.offset(), self.batch_size, batches + 1);
            if let Err(e) = self.run_batch(&mut batch).await {
                self.event_sink
                    .emit(PipelineEvent::StageFailed {
                        pipeline: self.name.clone(),
                        stage: e.stage().unwrap_or_default().to_string(),
                        batch: batch.batch_number(),
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }

            let batch_number = batch.batch_number();
            let record_count = batch.records().len();
            let error_count = batch.error_records().len();
            let (offset, end_of_data) = batch.into_commit();
            self.offset_tracker.commit(offset.clone(), end_of_data).await?;

            batches = batch_number;
            records += record_count as u64;
            error_records += error_count as u64;

            debug!(
                pipeline = %self.name,
                batch = batch_number,
                offset = ?offset,
                records = record_count,
                error_records = error_count,
                "Batch committed"
            );
            self.event_sink
                .emit(PipelineEvent::BatchCommitted {
                    pipeline: self.name.clone(),
                    batch: batch_number,
                    offset,
                    records: record_count,
                    error_records: error_count,
                })
                .await;
        };

        let event = match outcome {
            RunOutcome::Stopped => {
                let reason = self.stop.reason();
                info!(pipeline = %self.name, batches, reason = ?reason, "Pipeline stopped");
                PipelineEvent::Stopped {
                    pipeline: self.name.clone(),
                    batches,
                    reason,
                }
            }
            RunOutcome::Finished => {
                info!(pipeline = %self.name, batches, "Pipeline finished");
                PipelineEvent::Finished {
                    pipeline: self.name.clone(),
                    batches,
                }
            }
        };
        self.event_sink.emit(event).await;

        Ok(RunSummary {
            run_id,
            pipeline: self.name.clone(),
            batches,
            records,
            error_records,
            last_offset: self.offset(),
            outcome,
            started_at,
            ended_at: Utc::now(),
        })
    }

    async fn run_batch(&mut self, batch: &mut PipeBatch) -> Result<(), PipelineError> {
        for pipe in &mut self.pipes {
            pipe.process(batch).await?;
        }
        Ok(())
    }

    /// Requests the run loop to exit after the current batch.
    ///
    /// Has no effect once a run has terminated. A stop requested through a
    /// [`StopHandle`] is permanent: every later run exits before its first
    /// cycle.
    pub fn stop(&self) {
        if self.terminated {
            debug!(pipeline = %self.name, "Stop ignored, run already terminated");
            return;
        }
        self.stop.stop();
    }

    /// Returns a handle that can stop this pipeline from another task or thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns true if a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Destroys every stage in order.
    ///
    /// Every pipe is visited even if an earlier one fails; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Lifecycle`] if the pipeline was already
    /// destroyed.
    pub async fn destroy(&mut self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for pipe in &mut self.pipes {
            if let Err(e) = pipe.destroy().await {
                warn!(pipeline = %self.name, error = %e, "Stage destroy failed");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(pipeline = %self.name, "Pipeline destroyed");
        self.event_sink
            .emit(PipelineEvent::Destroyed {
                pipeline: self.name.clone(),
            })
            .await;
        Ok(())
    }

    /// Returns true once every pipe has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.pipes.iter().all(|p| p.state() == PipeState::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfiguration, StageConfig};
    use crate::core::StageKind;
    use crate::creation::StageBean;
    use crate::errors::StageError;
    use crate::stages::{FnStage, NoOpStage};
    use crate::testing::SequenceSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bean(stages: usize) -> PipelineBean {
        let mut config = PipelineConfiguration::new("unit");
        let mut beans = Vec::new();
        for i in 0..stages {
            let stage_config = StageConfig::new(format!("stage_{i}"), "noop");
            config = config.with_stage(stage_config.clone());
            beans.push(StageBean::new(stage_config, NoOpStage::new(StageKind::Processor)));
        }
        PipelineBean {
            config,
            stages: beans,
        }
    }

    #[test]
    fn test_pipes_match_configuration_order() {
        let pipeline = Pipeline::in_memory(bean(4), RuntimeParameters::new()).unwrap();

        assert_eq!(pipeline.pipe_count(), 4);
        assert_eq!(
            pipeline.stage_names(),
            vec!["stage_0", "stage_1", "stage_2", "stage_3"]
        );
        assert_eq!(pipeline.batch_size(), 1);
        assert!(pipeline.pipes().iter().all(|p| p.runtime().context().pipeline_name() == "unit"));
    }

    #[test]
    fn test_empty_bean_rejected() {
        let err = Pipeline::in_memory(bean(0), RuntimeParameters::new()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigResolution { .. }));
    }

    #[test]
    fn test_stage_count_mismatch_rejected() {
        let config = PipelineConfiguration::new("mismatch")
            .with_stage(StageConfig::new("a", "noop"))
            .with_stage(StageConfig::new("b", "noop"))
            .with_stage(StageConfig::new("c", "noop"));
        let bean = PipelineBean {
            config,
            stages: vec![StageBean::new(
                StageConfig::new("z", "noop"),
                NoOpStage::new(StageKind::Source),
            )],
        };

        let err = Pipeline::in_memory(bean, RuntimeParameters::new()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigResolution { .. }));
    }

    #[test]
    fn test_stage_order_mismatch_rejected() {
        let mut bean = bean(3);
        bean.stages.swap(0, 2);

        let err = Pipeline::in_memory(bean, RuntimeParameters::new()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigResolution { .. }));
        assert!(err.to_string().contains("stage_2"));
    }

    #[tokio::test]
    async fn test_run_before_init_is_lifecycle_error() {
        let mut pipeline = Pipeline::in_memory(bean(2), RuntimeParameters::new()).unwrap();

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Lifecycle {
                operation: "run",
                ..
            }
        ));
        assert_eq!(err.stage(), Some("stage_0"));
    }

    #[tokio::test]
    async fn test_destroy_twice() {
        let mut pipeline = Pipeline::in_memory(bean(2), RuntimeParameters::new()).unwrap();
        pipeline.init().await;

        pipeline.destroy().await.unwrap();
        assert!(pipeline.is_destroyed());
        assert!(matches!(
            pipeline.destroy().await.unwrap_err(),
            PipelineError::Lifecycle { operation: "destroy", .. }
        ));
        assert!(pipeline.run().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_after_failed_run_is_ignored() {
        let config = PipelineConfiguration::new("retry")
            .with_stage(StageConfig::new("src", "sequence"))
            .with_stage(StageConfig::new("flaky", "fail_once"));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let flaky = FnStage::new(StageKind::Destination, move |_ctx, _batch| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StageError::retryable(anyhow::anyhow!("unavailable")))
            } else {
                Ok(())
            }
        });
        let bean = PipelineBean {
            stages: vec![
                StageBean::new(config.stages[0].clone(), SequenceSource::new(["0"])),
                StageBean::new(config.stages[1].clone(), flaky),
            ],
            config,
        };
        let mut pipeline = Pipeline::in_memory(bean, RuntimeParameters::new()).unwrap();
        pipeline.init().await;

        assert!(pipeline.run().await.is_err());
        pipeline.stop();
        assert!(!pipeline.is_stop_requested());

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Finished);
        assert_eq!(pipeline.offset(), Some("0".to_string()));
        assert!(attempts.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_stop_is_visible_through_handle() {
        let pipeline = Pipeline::in_memory(bean(1), RuntimeParameters::new()).unwrap();
        let handle = pipeline.stop_handle();
        assert!(!pipeline.is_stop_requested());

        pipeline.stop();
        assert!(handle.is_stopped());
    }
}
