//! Models evaluated over a stream
//!
//! The evaluation core talks to a model only through [`StreamModel`]:
//! build on an initial window, test (pure), update (mutating). A model
//! declares what it can do through [`Capabilities`] and the driver branches
//! on those declarations rather than on concrete types.
//!
//! Two reference models ship with the crate:
//! - [`OnlineBinaryRelevance`]: one online logistic regression per label
//! - [`LabelFrequency`]: marginal label frequencies, a baseline

pub mod binary_relevance;
pub mod majority;

pub use binary_relevance::{BinaryRelevanceConfig, OnlineBinaryRelevance};
pub use majority::LabelFrequency;

use crate::models::{DatasetHeader, Instance};
use thiserror::Error;

/// Errors raised by a model's build/test/update operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("build failed: {0}")]
    Build(String),

    #[error("test failed: {0}")]
    Test(String),

    #[error("update failed: {0}")]
    Update(String),

    #[error("model used before it was built")]
    NotBuilt,

    #[error("expected {expected} outputs, model produced {found}")]
    OutputSize { expected: usize, found: usize },
}

/// A single capability a model may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Outputs one probability per binary label
    MultiLabel,
    /// Outputs one categorical value per target
    MultiTarget,
    /// Supports `update` after the initial build
    IncrementalUpdate,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Capability::MultiLabel => 0b001,
            Capability::MultiTarget => 0b010,
            Capability::IncrementalUpdate => 0b100,
        }
    }
}

/// Set of capabilities declared by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, cap: Capability) -> Self {
        Self(self.0 | cap.bit())
    }

    pub fn supports(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Multi-label with incremental updates, the common case
    pub fn incremental_multi_label() -> Self {
        Self::new()
            .with(Capability::MultiLabel)
            .with(Capability::IncrementalUpdate)
    }
}

/// The contract between the evaluation core and a model.
///
/// All calls happen on one thread, strictly in stream order.
pub trait StreamModel {
    /// Short identifier used in reports
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Train from scratch on the initial window.
    fn build(&mut self, header: &DatasetHeader, window: &[Instance]) -> Result<(), ModelError>;

    /// Score an instance without changing model state.
    ///
    /// Returns at least `L` values: probabilities for multi-label models,
    /// categorical values for multi-target models.
    fn test(&self, instance: &Instance) -> Result<Vec<f64>, ModelError>;

    /// Learn from one instance. When `labels_masked` is true every label slot
    /// is missing and the model must not fail because of it.
    fn update(&mut self, instance: &Instance, labels_masked: bool) -> Result<(), ModelError>;

    /// Free-form description for the report's info block
    fn describe(&self) -> String {
        self.name().to_string()
    }
}

/// Build a reference model by name (`br` or `majority`)
pub fn by_name(name: &str, learning_rate: f64) -> Option<Box<dyn StreamModel>> {
    match name.to_lowercase().as_str() {
        "br" | "binary-relevance" => Some(Box::new(OnlineBinaryRelevance::new(
            BinaryRelevanceConfig {
                learning_rate,
                ..Default::default()
            },
        ))),
        "majority" | "frequency" => Some(Box::new(LabelFrequency::new())),
        _ => None,
    }
}
