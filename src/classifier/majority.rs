//! Label-frequency baseline: predicts each label's observed positive rate.

use super::{Capabilities, ModelError, StreamModel};
use crate::models::{DatasetHeader, Instance};

#[derive(Debug, Clone, Default)]
pub struct LabelFrequency {
    positives: Vec<u64>,
    known: Vec<u64>,
    built: bool,
}

impl LabelFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe(&mut self, instance: &Instance) {
        for j in 0..self.known.len() {
            if let Some(pos) = instance.is_positive(j) {
                self.known[j] += 1;
                if pos {
                    self.positives[j] += 1;
                }
            }
        }
    }
}

impl StreamModel for LabelFrequency {
    fn name(&self) -> &str {
        "LabelFrequency"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::incremental_multi_label()
    }

    fn build(&mut self, header: &DatasetHeader, window: &[Instance]) -> Result<(), ModelError> {
        self.positives = vec![0; header.num_labels()];
        self.known = vec![0; header.num_labels()];
        self.built = true;
        for inst in window {
            self.observe(inst);
        }
        Ok(())
    }

    fn test(&self, _instance: &Instance) -> Result<Vec<f64>, ModelError> {
        if !self.built {
            return Err(ModelError::NotBuilt);
        }
        Ok(self
            .positives
            .iter()
            .zip(&self.known)
            .map(|(&p, &n)| if n == 0 { 0.5 } else { p as f64 / n as f64 })
            .collect())
    }

    fn update(&mut self, instance: &Instance, _labels_masked: bool) -> Result<(), ModelError> {
        if !self.built {
            return Err(ModelError::NotBuilt);
        }
        self.observe(instance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mask;

    #[test]
    fn test_tracks_frequencies() {
        let header = DatasetHeader::with_label_count("t", 1, 2);
        let mut model = LabelFrequency::new();
        model
            .build(
                &header,
                &[
                    Instance::binary(vec![0.0], &[true, false]),
                    Instance::binary(vec![0.0], &[true, true]),
                ],
            )
            .unwrap();

        let probe = Instance::binary(vec![0.0], &[false, false]);
        assert_eq!(model.test(&probe).unwrap(), vec![1.0, 0.5]);

        model.update(&mask(&probe), true).unwrap();
        assert_eq!(model.test(&probe).unwrap(), vec![1.0, 0.5]);

        model.update(&probe, false).unwrap();
        let p = model.test(&probe).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
