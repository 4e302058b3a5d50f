//! Execution context supplied to stages.
//!
//! This module provides:
//! - Pipeline-wide runtime parameters
//! - The per-stage context passed to `init` and `process`

mod execution;
mod parameters;

pub use execution::StageContext;
pub use parameters::RuntimeParameters;
