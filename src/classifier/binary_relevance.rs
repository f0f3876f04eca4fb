//! Online binary relevance
//!
//! One logistic regression per label, trained with plain SGD.
//! Missing label slots are skipped, so masked instances leave the
//! weights untouched.

use super::{Capabilities, ModelError, StreamModel};
use crate::models::{DatasetHeader, Instance};
use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryRelevanceConfig {
    /// SGD step size
    pub learning_rate: f64,
    /// Passes over the initial window during `build`
    pub epochs: usize,
    /// L2 penalty applied on every step
    pub l2: f64,
}

impl Default for BinaryRelevanceConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 5,
            l2: 0.0001,
        }
    }
}

/// Per-label logistic regression, updated one instance at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineBinaryRelevance {
    config: BinaryRelevanceConfig,
    /// Weights [L x d]
    weights: Vec<Vec<f64>>,
    /// Bias [L]
    bias: Vec<f64>,
    num_features: usize,
    built: bool,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl OnlineBinaryRelevance {
    pub fn new(config: BinaryRelevanceConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            bias: Vec::new(),
            num_features: 0,
            built: false,
        }
    }

    fn logit(&self, j: usize, x: &[f64]) -> f64 {
        self.weights[j]
            .iter()
            .zip(x)
            .fold(self.bias[j], |acc, (w, v)| acc + w * v)
    }

    /// One SGD step on every known label of `instance`; returns the mean log-loss
    fn step(&mut self, instance: &Instance) -> f64 {
        let x = instance.features();
        let lr = self.config.learning_rate;
        let l2 = self.config.l2;
        let mut loss = 0.0;
        let mut known = 0usize;

        for j in 0..self.weights.len() {
            let Some(target) = instance.is_positive(j) else {
                continue;
            };
            let target = if target { 1.0 } else { 0.0 };
            let p = sigmoid(self.logit(j, x));
            let grad = p - target;

            self.bias[j] -= lr * grad;
            for (w, v) in self.weights[j].iter_mut().zip(x) {
                *w -= lr * (grad * v + l2 * *w);
            }

            let prob = if target > 0.5 { p } else { 1.0 - p };
            loss -= prob.max(1e-12).ln();
            known += 1;
        }

        if known == 0 {
            0.0
        } else {
            loss / known as f64
        }
    }
}

impl Default for OnlineBinaryRelevance {
    fn default() -> Self {
        Self::new(BinaryRelevanceConfig::default())
    }
}

impl StreamModel for OnlineBinaryRelevance {
    fn name(&self) -> &str {
        "OnlineBinaryRelevance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::incremental_multi_label()
    }

    fn build(&mut self, header: &DatasetHeader, window: &[Instance]) -> Result<(), ModelError> {
        if header.num_labels() == 0 {
            return Err(ModelError::Build("dataset declares no labels".into()));
        }
        if window.is_empty() {
            return Err(ModelError::Build("initial window is empty".into()));
        }

        self.num_features = header.num_features;
        self.weights = vec![vec![0.0; header.num_features]; header.num_labels()];
        self.bias = vec![0.0; header.num_labels()];
        self.built = true;

        for epoch in 0..self.config.epochs {
            let loss: f64 = window.iter().map(|inst| self.step(inst)).sum::<f64>() / window.len() as f64;
            tracing::debug!("build epoch {}/{}: loss={:.4}", epoch + 1, self.config.epochs, loss);
        }
        Ok(())
    }

    fn test(&self, instance: &Instance) -> Result<Vec<f64>, ModelError> {
        if !self.built {
            return Err(ModelError::NotBuilt);
        }
        if instance.num_features() != self.num_features {
            return Err(ModelError::Test(format!(
                "expected {} features, got {}",
                self.num_features,
                instance.num_features()
            )));
        }
        Ok((0..self.weights.len())
            .map(|j| sigmoid(self.logit(j, instance.features())))
            .collect())
    }

    fn update(&mut self, instance: &Instance, labels_masked: bool) -> Result<(), ModelError> {
        if !self.built {
            return Err(ModelError::NotBuilt);
        }
        if labels_masked {
            return Ok(());
        }
        if instance.num_features() != self.num_features {
            return Err(ModelError::Update(format!(
                "expected {} features, got {}",
                self.num_features,
                instance.num_features()
            )));
        }
        self.step(instance);
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "OnlineBinaryRelevance(lr={}, epochs={}, l2={})",
            self.config.learning_rate, self.config.epochs, self.config.l2
        )
    }
}
