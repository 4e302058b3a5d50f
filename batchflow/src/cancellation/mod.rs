//! Cooperative cancellation for the run loop.
//!
//! A stop request is observed between batch cycles, never mid-batch.

mod token;

pub use token::{StopHandle, StopSignal};
