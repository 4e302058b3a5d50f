//! Pipeline lifecycle events.
//!
//! The run loop reports what it does through an [`EventSink`]. Sinks are
//! observers only; they cannot influence execution.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::Serialize;
use uuid::Uuid;

/// An event emitted by a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A run loop started.
    Started {
        /// Pipeline name.
        pipeline: String,
        /// Identifier of this run.
        run_id: Uuid,
        /// Stage instance names in execution order.
        stages: Vec<String>,
    },
    /// A batch traversed every stage and its offset was committed.
    BatchCommitted {
        /// Pipeline name.
        pipeline: String,
        /// Batch sequence number.
        batch: u64,
        /// The committed offset.
        offset: Option<String>,
        /// Records left in the batch after the last stage.
        records: usize,
        /// Records diverted to the error list.
        error_records: usize,
    },
    /// A stage failed and the batch was abandoned.
    StageFailed {
        /// Pipeline name.
        pipeline: String,
        /// Stage instance name.
        stage: String,
        /// Batch sequence number.
        batch: u64,
        /// Failure message.
        error: String,
    },
    /// The run loop exited because a stop was requested.
    Stopped {
        /// Pipeline name.
        pipeline: String,
        /// Batches committed during the run.
        batches: u64,
        /// The stop reason, if one was given.
        reason: Option<String>,
    },
    /// The run loop exited because the source was exhausted.
    Finished {
        /// Pipeline name.
        pipeline: String,
        /// Batches committed during the run.
        batches: u64,
    },
    /// Every stage was destroyed.
    Destroyed {
        /// Pipeline name.
        pipeline: String,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "pipeline.started",
            Self::BatchCommitted { .. } => "batch.committed",
            Self::StageFailed { .. } => "stage.failed",
            Self::Stopped { .. } => "pipeline.stopped",
            Self::Finished { .. } => "pipeline.finished",
            Self::Destroyed { .. } => "pipeline.destroyed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = PipelineEvent::Finished {
            pipeline: "orders".to_string(),
            batches: 3,
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"type": "finished", "pipeline": "orders", "batches": 3})
        );
        assert_eq!(event.event_type(), "pipeline.finished");
    }
}
