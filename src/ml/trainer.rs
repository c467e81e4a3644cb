use crate::dataset::{CleanedDataset, DatasetLoader, EncodedDataset};
use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::forest::RandomForest;
use crate::ml::models::{ForestParams, TrainingReport};
use crate::models::{FEATURE_NAMES, N_CLASSES};
use crate::state::ModelStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Fits the forest on encoded data and writes it to the model store
pub struct Trainer {
    params: ForestParams,
    store: Arc<dyn ModelStore>,
}

impl Trainer {
    pub fn new(params: ForestParams, store: Arc<dyn ModelStore>) -> Self {
        Self { params, store }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fit on every encoded row without touching the store.
    ///
    /// Fails with [`AppError::Training`] unless both diet classes are present.
    pub fn fit(&self, dataset: &EncodedDataset) -> Result<RandomForest> {
        let present = dataset.n_present_classes();
        if present < N_CLASSES {
            let counts = dataset.class_counts();
            return Err(AppError::Training(format!(
                "need both diet classes to fit, found {} class(es) (herbivorous: {}, carnivorous: {})",
                present, counts[0], counts[1]
            )));
        }

        info!(
            n_samples = dataset.n_samples(),
            n_trees = self.params.n_trees,
            seed = self.params.seed,
            "Fitting random forest"
        );

        let forest =
            RandomForest::fit(&dataset.features, &dataset.labels, N_CLASSES, &self.params)?
                .with_feature_names(FEATURE_NAMES);
        Ok(forest)
    }

    /// Fit and persist. The store is only written after a successful fit, so
    /// a failed run leaves any previous artifact untouched.
    pub fn train(&self, dataset: &EncodedDataset) -> Result<TrainingReport> {
        let forest = self.fit(dataset)?;
        let training_accuracy = training_accuracy(&forest, dataset)?;

        self.store.write(&forest).map_err(|e| {
            error!(location = %self.store.location(), error = %e, "Failed to store model");
            e
        })?;

        Ok(TrainingReport {
            n_samples: dataset.n_samples(),
            class_counts: dataset.class_counts(),
            n_trees: forest.n_trees(),
            training_accuracy,
            feature_importances: forest.feature_importances().to_vec(),
            cleaning: None,
            artifact_location: self.store.location(),
        })
    }

    /// Load, clean, encode, fit and store in one run
    pub fn train_from_path<P: AsRef<Path>>(&self, dataset_path: P) -> Result<TrainingReport> {
        let cleaned = DatasetLoader::new().load_path(dataset_path)?;
        self.train_cleaned(&cleaned)
    }

    pub fn train_cleaned(&self, cleaned: &CleanedDataset) -> Result<TrainingReport> {
        let encoded = EncodedDataset::from(cleaned);
        let mut report = self.train(&encoded)?;
        report.cleaning = Some(cleaned.report.clone());
        Ok(report)
    }
}

fn training_accuracy(forest: &RandomForest, dataset: &EncodedDataset) -> Result<f64> {
    if dataset.n_samples() == 0 {
        return Ok(0.0);
    }
    let predicted = forest.predict(&dataset.features)?;
    let correct = predicted
        .iter()
        .zip(&dataset.labels)
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / dataset.n_samples() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CleanedRecord;
    use crate::models::{Diet, FeatureVector};
    use crate::state::InMemoryModelStore;

    fn encoded(rows: &[(f64, Diet)]) -> EncodedDataset {
        let records: Vec<CleanedRecord> = rows
            .iter()
            .map(|&(length_m, diet)| CleanedRecord {
                features: FeatureVector::new(length_m, 100.0, 95.0),
                diet,
            })
            .collect();
        EncodedDataset::from_records(&records)
    }

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_train_writes_artifact() {
        let store = Arc::new(InMemoryModelStore::new());
        let trainer = Trainer::new(params(), store.clone());
        let data = encoded(&[
            (9.0, Diet::Carnivore),
            (12.0, Diet::Carnivore),
            (20.0, Diet::Herbivore),
            (25.0, Diet::Herbivore),
        ]);

        let report = trainer.train(&data).unwrap();

        assert!(store.exists());
        assert_eq!(report.n_samples, 4);
        assert_eq!(report.class_counts, [2, 2]);
        assert_eq!(report.n_trees, 20);
        assert_eq!(report.artifact_location, "memory");
        assert_eq!(store.read().unwrap().feature_names()[0], "length_m");
    }

    #[test]
    fn test_single_class_is_training_error() {
        let store = Arc::new(InMemoryModelStore::new());
        let trainer = Trainer::new(params(), store.clone());
        let data = encoded(&[(20.0, Diet::Herbivore), (25.0, Diet::Herbivore)]);

        let err = trainer.train(&data).unwrap_err();

        assert!(matches!(err, AppError::Training(_)));
        assert!(!store.exists());
    }

    #[test]
    fn test_empty_dataset_is_training_error() {
        let store = Arc::new(InMemoryModelStore::new());
        let trainer = Trainer::new(params(), store.clone());
        let err = trainer.train(&encoded(&[])).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_failed_run_keeps_previous_artifact() {
        let store = Arc::new(InMemoryModelStore::new());
        let trainer = Trainer::new(params(), store.clone());
        trainer
            .train(&encoded(&[(9.0, Diet::Carnivore), (20.0, Diet::Herbivore)]))
            .unwrap();
        let before = store.bytes();

        assert!(trainer
            .train(&encoded(&[(30.0, Diet::Herbivore)]))
            .is_err());
        assert_eq!(store.bytes(), before);
    }

    #[test]
    fn test_training_accuracy_on_separable_data() {
        let store = Arc::new(InMemoryModelStore::new());
        let trainer = Trainer::new(params(), store);
        let report = trainer
            .train(&encoded(&[
                (9.0, Diet::Carnivore),
                (12.0, Diet::Carnivore),
                (15.0, Diet::Carnivore),
                (20.0, Diet::Herbivore),
                (25.0, Diet::Herbivore),
                (30.0, Diet::Herbivore),
            ]))
            .unwrap();
        assert!(report.training_accuracy >= 0.5);
    }
}
