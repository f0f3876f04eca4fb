//! Core data models for mlstream
//!
//! These models represent the labelled instances flowing through an
//! evaluation: the instance itself, the dataset header that describes its
//! shape, and the ordered stream the driver consumes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label values at or above this are counted as positive for binary labels.
pub const POSITIVE_CUTOFF: f64 = 0.5;

/// A single labelled instance: `d` feature values and `L` label slots.
///
/// A label slot of `None` is missing (withheld supervision). Instances are
/// never mutated after construction; [`mask`] produces a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "x")]
    features: Vec<f64>,
    #[serde(rename = "y")]
    labels: Vec<Option<f64>>,
}

impl Instance {
    pub fn new(features: Vec<f64>, labels: Vec<Option<f64>>) -> Self {
        Self { features, labels }
    }

    /// Convenience constructor for fully labelled binary instances
    pub fn binary(features: Vec<f64>, labels: &[bool]) -> Self {
        Self {
            features,
            labels: labels
                .iter()
                .map(|&b| Some(if b { 1.0 } else { 0.0 }))
                .collect(),
        }
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn labels(&self) -> &[Option<f64>] {
        &self.labels
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Whether label `j` is a known positive. `None` if missing or out of range.
    pub fn is_positive(&self, j: usize) -> Option<bool> {
        self.labels
            .get(j)
            .copied()
            .flatten()
            .map(|v| v >= POSITIVE_CUTOFF)
    }

    /// True if every label slot is missing
    pub fn is_masked(&self) -> bool {
        self.labels.iter().all(Option::is_none)
    }

    /// Number of known positive labels
    pub fn positive_count(&self) -> usize {
        (0..self.labels.len())
            .filter(|&j| self.is_positive(j) == Some(true))
            .count()
    }
}

/// Return a copy of `instance` with every label slot marked missing.
///
/// `instance` itself is not modified; its labels stay available for scoring.
pub fn mask(instance: &Instance) -> Instance {
    Instance {
        features: instance.features.clone(),
        labels: vec![None; instance.labels.len()],
    }
}

/// Shape and naming of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHeader {
    /// Dataset (relation) name
    #[serde(default)]
    pub name: String,
    /// Feature vector length `d`
    pub num_features: usize,
    /// One name per label slot; its length is `L`
    pub labels: Vec<String>,
}

impl DatasetHeader {
    pub fn new(name: impl Into<String>, num_features: usize, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            num_features,
            labels,
        }
    }

    /// Header with generated label names `y0..y{L-1}`
    pub fn with_label_count(name: impl Into<String>, num_features: usize, num_labels: usize) -> Self {
        Self::new(
            name,
            num_features,
            (0..num_labels).map(|j| format!("y{j}")).collect(),
        )
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Describe the first difference with `other`, or `None` if compatible.
    pub fn mismatch(&self, other: &DatasetHeader) -> Option<String> {
        if self.labels.len() != other.labels.len() {
            return Some(format!(
                "label count differs: {} vs {}",
                self.labels.len(),
                other.labels.len()
            ));
        }
        if self.num_features != other.num_features {
            return Some(format!(
                "feature count differs: {} vs {}",
                self.num_features, other.num_features
            ));
        }
        self.labels
            .iter()
            .zip(&other.labels)
            .enumerate()
            .find(|(_, (a, b))| a != b)
            .map(|(j, (a, b))| format!("label {j} is named '{a}' vs '{b}'"))
    }
}

/// An instance that doesn't fit its stream's header
#[derive(Error, Debug, Clone, PartialEq)]
#[error("instance {index}: expected {expected_features} features and {expected_labels} labels, found {found_features} and {found_labels}")]
pub struct ShapeError {
    pub index: usize,
    pub expected_features: usize,
    pub expected_labels: usize,
    pub found_features: usize,
    pub found_labels: usize,
}

/// A finite ordered sequence of instances sharing one header.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    header: DatasetHeader,
    instances: Vec<Instance>,
}

impl Stream {
    /// Build a stream, checking every instance against the header.
    pub fn new(header: DatasetHeader, instances: Vec<Instance>) -> Result<Self, ShapeError> {
        for (index, inst) in instances.iter().enumerate() {
            if inst.num_features() != header.num_features || inst.num_labels() != header.num_labels() {
                return Err(ShapeError {
                    index,
                    expected_features: header.num_features,
                    expected_labels: header.num_labels(),
                    found_features: inst.num_features(),
                    found_labels: inst.num_labels(),
                });
            }
        }
        Ok(Self { header, instances })
    }

    /// Build a stream whose instances are known to fit the header
    pub(crate) fn from_trusted(header: DatasetHeader, instances: Vec<Instance>) -> Self {
        debug_assert!(instances
            .iter()
            .all(|i| i.num_features() == header.num_features && i.num_labels() == header.num_labels()));
        Self { header, instances }
    }

    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn num_labels(&self) -> usize {
        self.header.num_labels()
    }

    pub fn into_parts(self) -> (DatasetHeader, Vec<Instance>) {
        (self.header, self.instances)
    }

    /// Split into the initial training window and the remainder.
    pub fn split_initial(&self, window: usize) -> (&[Instance], &[Instance]) {
        self.instances.split_at(window.min(self.instances.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_leaves_original_untouched() {
        let inst = Instance::binary(vec![0.1, 0.2], &[true, false, true]);
        let masked = mask(&inst);

        assert!(masked.is_masked());
        assert_eq!(masked.num_labels(), 3);
        assert_eq!(masked.features(), inst.features());
        assert_eq!(inst.positive_count(), 2);
        assert!(!inst.is_masked());
    }

    #[test]
    fn test_is_positive_handles_missing() {
        let inst = Instance::new(vec![], vec![Some(1.0), None, Some(0.0)]);
        assert_eq!(inst.is_positive(0), Some(true));
        assert_eq!(inst.is_positive(1), None);
        assert_eq!(inst.is_positive(2), Some(false));
        assert_eq!(inst.is_positive(7), None);
    }

    #[test]
    fn test_header_mismatch_messages() {
        let a = DatasetHeader::with_label_count("a", 4, 3);
        assert!(a.mismatch(&a.clone()).is_none());

        let fewer = DatasetHeader::with_label_count("a", 4, 2);
        assert!(a.mismatch(&fewer).unwrap().contains("label count"));

        let wider = DatasetHeader::with_label_count("a", 5, 3);
        assert!(a.mismatch(&wider).unwrap().contains("feature count"));

        let renamed = DatasetHeader::new("a", 4, vec!["y0".into(), "q".into(), "y2".into()]);
        assert!(a.mismatch(&renamed).unwrap().contains("label 1"));
    }

    #[test]
    fn test_stream_rejects_bad_shape() {
        let header = DatasetHeader::with_label_count("s", 2, 2);
        let err = Stream::new(
            header,
            vec![
                Instance::binary(vec![0.0, 1.0], &[true, false]),
                Instance::binary(vec![0.0], &[true, false]),
            ],
        )
        .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.found_features, 1);
    }

    #[test]
    fn test_split_initial() {
        let header = DatasetHeader::with_label_count("s", 1, 1);
        let instances = (0..5).map(|i| Instance::binary(vec![i as f64], &[i % 2 == 0])).collect();
        let stream = Stream::new(header, instances).unwrap();
        let (init, rest) = stream.split_initial(2);
        assert_eq!(init.len(), 2);
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].features(), &[2.0]);
    }
}
