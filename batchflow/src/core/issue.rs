//! Validation findings reported by stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Suspicious, but the stage can run.
    Warning,
    /// The stage cannot run correctly.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A validation finding attributed to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity of the finding.
    pub severity: Severity,
    /// Instance name of the originating stage. Empty until attributed.
    pub stage: String,
    /// The configuration key the finding refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_key: Option<String>,
    /// Human readable message.
    pub message: String,
}

impl Issue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(severity: Severity, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage: stage.into(),
            config_key: None,
            message: message.into(),
        }
    }

    /// Creates an error-severity issue.
    #[must_use]
    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, stage, message)
    }

    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, stage, message)
    }

    /// Sets the configuration key.
    #[must_use]
    pub fn with_config_key(mut self, key: impl Into<String>) -> Self {
        self.config_key = Some(key.into());
        self
    }

    /// Returns true if the issue is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.stage)?;
        if let Some(ref key) = self.config_key {
            write!(f, " ({key})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Returns true if any issue has error severity.
#[must_use]
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = Issue::error("http_01", "resource URL is required")
            .with_config_key("conf.resourceUrl");
        assert_eq!(
            issue.to_string(),
            "[error] http_01 (conf.resourceUrl): resource URL is required"
        );

        let issue = Issue::warning("src", "empty directory");
        assert_eq!(issue.to_string(), "[warning] src: empty directory");
    }

    #[test]
    fn test_has_errors() {
        let warnings = vec![Issue::warning("a", "w1"), Issue::warning("b", "w2")];
        assert!(!has_errors(&warnings));

        let mixed = vec![Issue::warning("a", "w1"), Issue::error("b", "e1")];
        assert!(has_errors(&mixed));
        assert!(!has_errors(&[]));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
