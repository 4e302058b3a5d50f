//! # Batchflow
//!
//! The execution core of a batch-oriented data movement pipeline.
//!
//! A pipeline is a configured chain of stages: one source, zero or more
//! processors, one or more destinations. Batchflow provides:
//!
//! - **Assembly**: resolve a [`PipelineConfiguration`](config::PipelineConfiguration)
//!   into stage instances through a [`StageAssembler`](creation::StageAssembler)
//! - **Validation**: every stage's `init` issues collected in one pass
//! - **Batch cycles**: each batch flows through every stage in order, then its
//!   offset is committed
//! - **Resumption**: offset trackers seed each batch and decide when the
//!   source is exhausted
//! - **Cancellation**: a cloneable stop handle observed between batches
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//!
//! let config = PipelineConfiguration::from_json_str(json)?;
//! let mut pipeline = PipelineBuilder::new(config)
//!     .offset_tracker(FileOffsetTracker::open("offsets.json").await?)
//!     .build(&StageRegistry::with_builtin_stages())?;
//!
//! let issues = pipeline.init().await;
//! if !has_errors(&issues) {
//!     let summary = pipeline.run().await?;
//! }
//! pipeline.destroy().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod creation;
pub mod errors;
pub mod events;
pub mod observability;
pub mod runner;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::StopHandle;
    pub use crate::config::{PipelineConfiguration, StageConfig};
    pub use crate::context::{RuntimeParameters, StageContext};
    pub use crate::core::{has_errors, ErrorRecord, Issue, Record, Severity, StageKind};
    pub use crate::creation::{PipelineBean, StageAssembler, StageBean, StageRegistry};
    pub use crate::errors::{OffsetError, PipelineError, StageError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::runner::{
        FileOffsetTracker, InMemoryOffsetTracker, PipeBatch, Pipeline, PipelineBuilder,
        RunOutcome, RunSummary, SourceOffsetTracker,
    };
    pub use crate::stages::{FnStage, NoOpStage, Stage};
}
