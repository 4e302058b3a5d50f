//! Error types for the batchflow engine.
//!
//! Validation problems are not errors: they travel as [`Issue`](crate::core::Issue)
//! data. The types here cover construction failures, per-batch stage
//! failures, offset persistence and lifecycle misuse.

use crate::core::PipeState;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration could not be resolved into runnable stages.
    #[error("Configuration resolution failed{}: {message}", stage_suffix(.stage))]
    ConfigResolution {
        /// The stage instance the failure is attributed to, if any.
        stage: Option<String>,
        /// What went wrong.
        message: String,
    },

    /// A stage failed while processing a batch.
    #[error("Stage '{stage}' failed on batch {batch}: {source}")]
    StageFailed {
        /// The stage instance name.
        stage: String,
        /// The batch sequence number (1-based).
        batch: u64,
        /// The offset the batch was seeded with.
        offset: Option<String>,
        /// The underlying stage failure.
        #[source]
        source: StageError,
    },

    /// An operation was invoked in a state that does not allow it.
    #[error("Cannot {operation} stage '{stage}' while it is {state}")]
    Lifecycle {
        /// The stage instance name.
        stage: String,
        /// The attempted operation.
        operation: &'static str,
        /// The state the stage was in.
        state: PipeState,
    },

    /// The offset tracker failed.
    #[error("{0}")]
    Offset(#[from] OffsetError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn stage_suffix(stage: &Option<String>) -> String {
    stage
        .as_ref()
        .map(|s| format!(" for stage '{s}'"))
        .unwrap_or_default()
}

impl PipelineError {
    /// Creates a configuration resolution error not tied to a stage.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigResolution {
            stage: None,
            message: message.into(),
        }
    }

    /// Creates a configuration resolution error attributed to a stage.
    #[must_use]
    pub fn stage_config(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigResolution {
            stage: Some(stage.into()),
            message: message.into(),
        }
    }

    /// Returns the stage the error is attributed to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::ConfigResolution { stage, .. } => stage.as_deref(),
            Self::StageFailed { stage, .. } | Self::Lifecycle { stage, .. } => Some(stage),
            Self::Offset(_) | Self::Serialization(_) => None,
        }
    }

    /// Returns true if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StageFailed { source, .. } => source.is_retryable(),
            Self::Offset(OffsetError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Error returned by a stage's `process` call.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stage was asked to process without a usable configuration.
    #[error("stage is not configured: {0}")]
    NotConfigured(String),

    /// Transient failure, worth retrying.
    #[error("retryable: {0}")]
    Retryable(#[source] anyhow::Error),

    /// Permanent failure, won't succeed on retry.
    #[error("permanent: {0}")]
    Permanent(#[source] anyhow::Error),
}

impl StageError {
    /// Creates a retryable error.
    pub fn retryable(err: impl Into<anyhow::Error>) -> Self {
        Self::Retryable(err.into())
    }

    /// Creates a permanent error.
    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        Self::Permanent(err.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Errors raised by offset trackers.
#[derive(Debug, Error)]
pub enum OffsetError {
    /// Reading or writing the persisted offset failed.
    #[error("Offset store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted offset could not be decoded.
    #[error("Offset store is corrupt: {0}")]
    Corrupt(String),

    /// A commit arrived after the source was reported finished.
    #[error("Offset tracker already finished at offset {offset:?}")]
    AlreadyFinished {
        /// The last committed offset.
        offset: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = PipelineError::config("no stages configured");
        assert_eq!(
            err.to_string(),
            "Configuration resolution failed: no stages configured"
        );
        assert!(err.stage().is_none());

        let err = PipelineError::stage_config("http_01", "unknown stage 'nope'");
        assert!(err.to_string().contains("for stage 'http_01'"));
        assert_eq!(err.stage(), Some("http_01"));
    }

    #[test]
    fn test_stage_failed_attribution() {
        let err = PipelineError::StageFailed {
            stage: "dest".to_string(),
            batch: 3,
            offset: Some("2".to_string()),
            source: StageError::retryable(anyhow::anyhow!("connection reset")),
        };

        assert_eq!(err.stage(), Some("dest"));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("batch 3"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = PipelineError::Lifecycle {
            stage: "src".to_string(),
            operation: "process",
            state: PipeState::Uninitialized,
        };
        assert_eq!(
            err.to_string(),
            "Cannot process stage 'src' while it is uninitialized"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_stage_error_kinds() {
        assert!(StageError::retryable(anyhow::anyhow!("timeout")).is_retryable());
        assert!(!StageError::permanent(anyhow::anyhow!("bad payload")).is_retryable());
        assert!(!StageError::NotConfigured("missing url".into()).is_retryable());
    }

    #[test]
    fn test_offset_error_converts() {
        let err: PipelineError = OffsetError::Corrupt("expected object".into()).into();
        assert!(matches!(err, PipelineError::Offset(OffsetError::Corrupt(_))));
        assert!(!err.is_retryable());
    }
}
