//! Stage kind and pipe lifecycle enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a stage plays in the dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Produces records and advances the offset. Configured first.
    Source,
    /// Filters or transforms records in place.
    Processor,
    /// Delivers records somewhere outside the pipeline. Configured last.
    Destination,
}

impl Default for StageKind {
    fn default() -> Self {
        Self::Processor
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Processor => write!(f, "processor"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Lifecycle state of a stage pipe.
///
/// `Uninitialized -> Initialized -> Processing (repeatable) -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeState {
    /// Constructed, `init` not yet called.
    Uninitialized,
    /// `init` has run; no batch processed yet.
    Initialized,
    /// At least one batch has been processed.
    Processing,
    /// Resources released; terminal.
    Destroyed,
}

impl Default for PipeState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl fmt::Display for PipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Processing => write!(f, "processing"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

impl PipeState {
    /// Returns true if batches may be processed in this state.
    #[must_use]
    pub fn can_process(&self) -> bool {
        matches!(self, Self::Initialized | Self::Processing)
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}
