//! Stub stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::cancellation::StopHandle;
use crate::context::StageContext;
use crate::core::{Issue, Record, StageKind};
use crate::errors::StageError;
use crate::runner::PipeBatch;
use crate::stages::Stage;

/// A shared, ordered log of stage calls.
///
/// Entries look like `init:src`, `process:src:1`, `destroy:src`.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns entries starting with the prefix.
    #[must_use]
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// A source emitting one batch per listed offset.
///
/// Resumes after the batch's previous offset if it is in the list, and
/// marks end of data on the last offset.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    offsets: Vec<String>,
    records_per_batch: Option<usize>,
}

impl SequenceSource {
    /// Creates a source over the given offsets.
    pub fn new<I, S>(offsets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            offsets: offsets.into_iter().map(Into::into).collect(),
            records_per_batch: None,
        }
    }

    /// Emits `count` records per batch instead of the batch size.
    #[must_use]
    pub fn with_records_per_batch(mut self, count: usize) -> Self {
        self.records_per_batch = Some(count);
        self
    }
}

#[async_trait]
impl Stage for SequenceSource {
    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    async fn process(&mut self, ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError> {
        let position = batch
            .previous_offset()
            .and_then(|prev| self.offsets.iter().position(|o| o == prev))
            .map_or(0, |i| i + 1);

        let Some(offset) = self.offsets.get(position).cloned() else {
            batch.mark_end_of_data();
            return Ok(());
        };

        let count = self.records_per_batch.unwrap_or_else(|| batch.batch_size());
        for n in 0..count {
            batch.add_record(
                Record::new(serde_json::json!({ "offset": offset, "n": n }))
                    .with_source_id(format!("{}::{offset}::{n}", ctx.instance_name())),
            );
        }

        batch.set_new_offset(offset);
        if position + 1 == self.offsets.len() {
            batch.mark_end_of_data();
        }
        Ok(())
    }
}

/// What a [`RecordingDestination`] saw for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch {
    /// Batch sequence number.
    pub batch_number: u64,
    /// Offset the batch was seeded with.
    pub previous_offset: Option<String>,
    /// Offset the batch will commit.
    pub new_offset: Option<String>,
    /// Record payloads in order.
    pub values: Vec<serde_json::Value>,
}

/// A destination that keeps a copy of every batch it receives.
///
/// Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingDestination {
    batches: Arc<Mutex<Vec<RecordedBatch>>>,
}

impl RecordingDestination {
    /// Creates a new recording destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded batches.
    #[must_use]
    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.batches.lock().clone()
    }

    /// Returns the number of batches received.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns the number of records received across all batches.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(|b| b.values.len()).sum()
    }
}

#[async_trait]
impl Stage for RecordingDestination {
    fn kind(&self) -> StageKind {
        StageKind::Destination
    }

    async fn process(&mut self, _ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError> {
        self.batches.lock().push(RecordedBatch {
            batch_number: batch.batch_number(),
            previous_offset: batch.previous_offset().map(String::from),
            new_offset: batch.new_offset().map(String::from),
            values: batch.records().iter().map(|r| r.value.clone()).collect(),
        });
        Ok(())
    }
}

/// A stage that fails every batch.
#[derive(Debug, Clone)]
pub struct FailingStage {
    kind: StageKind,
    error: String,
    retryable: bool,
}

impl FailingStage {
    /// Creates a processor that fails permanently.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            kind: StageKind::Processor,
            error: error.into(),
            retryable: false,
        }
    }

    /// Creates a processor that fails with a retryable error.
    #[must_use]
    pub fn retryable(error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(error)
        }
    }

    /// Sets the stage kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn process(&mut self, _ctx: &StageContext, _batch: &mut PipeBatch) -> Result<(), StageError> {
        let err = anyhow::anyhow!("{}", self.error);
        if self.retryable {
            Err(StageError::Retryable(err))
        } else {
            Err(StageError::Permanent(err))
        }
    }
}

/// A configurable stage that logs every call.
///
/// Can report issues at init, request a stop on a given batch, or fail on a
/// given batch.
#[derive(Debug)]
pub struct ProbeStage {
    kind: StageKind,
    log: CallLog,
    issues: Vec<Issue>,
    stop_on: Option<(u64, StopHandle)>,
    fail_on: Option<u64>,
}

impl ProbeStage {
    /// Creates a probe writing to `log`.
    #[must_use]
    pub fn new(kind: StageKind, log: CallLog) -> Self {
        Self {
            kind,
            log,
            issues: Vec::new(),
            stop_on: None,
            fail_on: None,
        }
    }

    /// Reports these issues from `init`.
    #[must_use]
    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    /// Requests a stop while processing batch `batch_number`.
    #[must_use]
    pub fn stop_on_batch(mut self, batch_number: u64, handle: StopHandle) -> Self {
        self.stop_on = Some((batch_number, handle));
        self
    }

    /// Fails permanently on batch `batch_number`.
    #[must_use]
    pub fn fail_on_batch(mut self, batch_number: u64) -> Self {
        self.fail_on = Some(batch_number);
        self
    }
}

#[async_trait]
impl Stage for ProbeStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn init(&mut self, ctx: &StageContext) -> Vec<Issue> {
        self.log.push(format!("init:{}", ctx.instance_name()));
        self.issues.clone()
    }

    async fn process(&mut self, ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError> {
        let batch_number = batch.batch_number();
        self.log
            .push(format!("process:{}:{batch_number}", ctx.instance_name()));

        if let Some((n, handle)) = &self.stop_on {
            if *n == batch_number {
                handle.stop_with_reason(format!("{} requested stop", ctx.instance_name()));
            }
        }
        if self.fail_on == Some(batch_number) {
            return Err(StageError::permanent(anyhow::anyhow!(
                "probe failure on batch {batch_number}"
            )));
        }
        Ok(())
    }

    async fn destroy(&mut self) {
        self.log.push("destroy");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn test_sequence_source_walks_offsets() {
        let mut source = SequenceSource::new(["a", "b"]).with_records_per_batch(2);
        let ctx = TestContext::new().build_stage_context("src", StageKind::Source);

        let mut first = PipeBatch::new(None, 1, 1);
        source.process(&ctx, &mut first).await.unwrap();
        assert_eq!(first.new_offset(), Some("a"));
        assert_eq!(first.records().len(), 2);
        assert!(!first.is_end_of_data());

        let mut second = PipeBatch::new(Some("a".to_string()), 1, 2);
        source.process(&ctx, &mut second).await.unwrap();
        assert_eq!(second.new_offset(), Some("b"));
        assert!(second.is_end_of_data());

        let mut past_end = PipeBatch::new(Some("b".to_string()), 1, 3);
        source.process(&ctx, &mut past_end).await.unwrap();
        assert!(past_end.records().is_empty());
        assert!(past_end.is_end_of_data());
    }

    #[tokio::test]
    async fn test_recording_destination_shares_state() {
        let recorder = RecordingDestination::new();
        let mut stage = recorder.clone();
        let ctx = TestContext::new().build_stage_context("dest", StageKind::Destination);

        let mut batch = PipeBatch::new(Some("0".to_string()), 1, 1);
        batch.add_record(Record::new(serde_json::json!(1)));
        stage.process(&ctx, &mut batch).await.unwrap();

        assert_eq!(recorder.batch_count(), 1);
        assert_eq!(recorder.record_count(), 1);
        assert_eq!(recorder.batches()[0].previous_offset.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let ctx = TestContext::new().build_stage_context("fail", StageKind::Processor);
        let mut batch = PipeBatch::new(None, 1, 1);

        let err = FailingStage::new("boom").process(&ctx, &mut batch).await.unwrap_err();
        assert!(!err.is_retryable());

        let err = FailingStage::retryable("later")
            .process(&ctx, &mut batch)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_probe_stage_logs_and_stops() {
        let log = CallLog::new();
        let handle = StopHandle::new();
        let mut probe = ProbeStage::new(StageKind::Processor, log.clone())
            .with_issues(vec![Issue::warning("", "slow disk")])
            .stop_on_batch(2, handle.clone())
            .fail_on_batch(3);
        let ctx = TestContext::new().build_stage_context("probe", StageKind::Processor);

        assert_eq!(probe.init(&ctx).await.len(), 1);
        probe.process(&ctx, &mut PipeBatch::new(None, 1, 1)).await.unwrap();
        assert!(!handle.is_stopped());
        probe.process(&ctx, &mut PipeBatch::new(None, 1, 2)).await.unwrap();
        assert!(handle.is_stopped());
        assert!(probe.process(&ctx, &mut PipeBatch::new(None, 1, 3)).await.is_err());

        assert_eq!(
            log.entries(),
            vec!["init:probe", "process:probe:1", "process:probe:2", "process:probe:3"]
        );
    }
}
