//! Pipeline execution.
//!
//! This module provides:
//! - The per-cycle [`PipeBatch`]
//! - Source offset trackers
//! - Stage runtimes and lifecycle pipes
//! - The [`Pipeline`] run loop and its builder

mod batch;
mod builder;
mod offset;
mod pipeline;
mod stage_pipe;
mod stage_runtime;


pub use batch::PipeBatch;
pub use builder::PipelineBuilder;
pub use offset::{FileOffsetTracker, InMemoryOffsetTracker, SourceOffsetTracker};
pub use pipeline::{Pipeline, RunOutcome, RunSummary};
pub use stage_pipe::StagePipe;
pub use stage_runtime::StageRuntime;
