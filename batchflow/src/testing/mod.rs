//! Testing utilities for batchflow pipelines.
//!
//! This module provides:
//! - Stub sources, destinations and probe stages
//! - Offset trackers that record or limit commits
//! - Assertions for commits, issues and stage failures

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_committed_offsets, assert_issue_stages, assert_no_error_issues, assert_stage_failed,
};
pub use fixtures::{CommitLog, CycleLimitTracker, RecordingOffsetTracker, TestContext, TestPipeline};
pub use mocks::{
    CallLog, FailingStage, ProbeStage, RecordedBatch, RecordingDestination, SequenceSource,
};
