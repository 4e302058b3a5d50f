//! Core domain model types for batchflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage kind and pipe lifecycle enums
//! - Records and error records
//! - Validation issues

mod issue;
mod record;
mod status;

pub use issue::{has_errors, Issue, Severity};
pub use record::{ErrorRecord, Record};
pub use status::{PipeState, StageKind};
