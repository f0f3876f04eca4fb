//! mlstream - prequential evaluation of multi-label stream models
//!
//! A model is built on an initial window and then tested and updated on
//! every following instance, in order, with only a configurable fraction
//! of labels revealed. Statistics are snapshotted per window and decision
//! thresholds recalibrated as the stream drifts.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod eval;
pub mod models;
pub mod reporters;
pub mod synthetic;

pub use classifier::{Capabilities, Capability, ModelError, StreamModel};
pub use config::{EvalConfig, WindowPolicy};
pub use eval::{EvalError, EvalReport, EvaluationDriver};
pub use models::{mask, DatasetHeader, Instance, Stream};
