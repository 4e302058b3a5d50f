//! Test assertions for pipeline runs.

use super::CommitLog;
use crate::core::Issue;
use crate::errors::PipelineError;

/// Asserts that exactly these offsets were committed, in order.
pub fn assert_committed_offsets(log: &CommitLog, expected: &[&str]) {
    let actual = log.offsets();
    let expected: Vec<Option<String>> = expected.iter().map(|o| Some((*o).to_string())).collect();
    assert_eq!(
        actual, expected,
        "Expected commits {expected:?}, got {actual:?}"
    );
}

/// Asserts that no issue has error severity.
pub fn assert_no_error_issues(issues: &[Issue]) {
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(ToString::to_string)
        .collect();
    assert!(errors.is_empty(), "Expected no error issues, got: {errors:?}");
}

/// Asserts that issues came from these stages, in this order.
pub fn assert_issue_stages(issues: &[Issue], expected: &[&str]) {
    let actual: Vec<&str> = issues.iter().map(|i| i.stage.as_str()).collect();
    assert_eq!(actual, expected, "Expected issues from {expected:?}, got {actual:?}");
}

/// Asserts that the error is a stage failure attributed to `stage`.
pub fn assert_stage_failed(err: &PipelineError, stage: &str) {
    match err {
        PipelineError::StageFailed { stage: actual, .. } => {
            assert_eq!(actual, stage, "Expected failure in stage '{stage}', got '{actual}'");
        }
        other => panic!("Expected stage failure in '{stage}', got: {other}"),
    }
}
