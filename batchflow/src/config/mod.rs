//! Pipeline and stage configuration.
//!
//! Configuration is plain serde data. Stage values stay untyped here and are
//! deserialized into per-stage structs during `init` via
//! [`StageContext::typed_config`](crate::context::StageContext::typed_config).

mod types;

pub use types::{PipelineConfiguration, StageConfig, DEFAULT_BATCH_SIZE};
