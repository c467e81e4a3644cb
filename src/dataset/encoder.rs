use crate::dataset::loader::{CleanedDataset, CleanedRecord};
use crate::models::{Diet, FeatureVector, N_CLASSES, N_FEATURES};
use ndarray::Array2;

/// Map a cleaned record to its feature vector and binary label
pub fn encode(record: &CleanedRecord) -> (FeatureVector, u8) {
    (record.features, record.diet.label())
}

/// Encoded training set (n_samples × 3 features, one label per row)
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub features: Array2<f64>,
    pub labels: Vec<u8>,
}

impl EncodedDataset {
    pub fn from_records(records: &[CleanedRecord]) -> Self {
        let mut features = Array2::zeros((records.len(), N_FEATURES));
        let mut labels = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let (vector, label) = encode(record);
            for (j, value) in vector.to_array().into_iter().enumerate() {
                features[[i, j]] = value;
            }
            labels.push(label);
        }

        Self { features, labels }
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Rows per class, indexed by label
    pub fn class_counts(&self) -> [usize; N_CLASSES] {
        let mut counts = [0; N_CLASSES];
        for &label in &self.labels {
            counts[label as usize] += 1;
        }
        counts
    }

    /// Number of classes with at least one row
    pub fn n_present_classes(&self) -> usize {
        self.class_counts().iter().filter(|&&c| c > 0).count()
    }

    pub fn count_of(&self, diet: Diet) -> usize {
        self.class_counts()[diet.index()]
    }
}

impl From<&CleanedDataset> for EncodedDataset {
    fn from(dataset: &CleanedDataset) -> Self {
        Self::from_records(&dataset.records)
    }
}
