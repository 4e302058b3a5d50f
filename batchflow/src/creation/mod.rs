//! Turning configuration into runnable stages.
//!
//! The engine does not know how to build stages. A [`StageAssembler`]
//! resolves every [`StageConfig`] into a stage instance ahead of pipeline
//! construction; [`StageRegistry`] is the stock implementation.

mod registry;

pub use registry::{StageFactory, StageRegistry};

use crate::config::{PipelineConfiguration, StageConfig};
use crate::errors::PipelineError;
use crate::stages::Stage;

/// A stage instance together with the configuration it was built from.
#[derive(Debug)]
pub struct StageBean {
    /// The stage's configuration.
    pub config: StageConfig,
    /// The stage instance.
    pub stage: Box<dyn Stage>,
}

impl StageBean {
    /// Creates a bean from a concrete stage.
    pub fn new(config: StageConfig, stage: impl Stage + 'static) -> Self {
        Self::boxed(config, Box::new(stage))
    }

    /// Creates a bean from an already boxed stage.
    #[must_use]
    pub fn boxed(config: StageConfig, stage: Box<dyn Stage>) -> Self {
        Self { config, stage }
    }
}

/// The fully resolved stage list of a pipeline, in configuration order.
#[derive(Debug)]
pub struct PipelineBean {
    /// The configuration the beans were resolved from.
    pub config: PipelineConfiguration,
    /// One bean per configured stage.
    pub stages: Vec<StageBean>,
}

impl PipelineBean {
    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Resolves a pipeline configuration into stage instances.
pub trait StageAssembler {
    /// Builds one stage per configured stage, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigResolution`] if any stage cannot be
    /// resolved.
    fn assemble(&self, config: &PipelineConfiguration) -> Result<PipelineBean, PipelineError>;
}
