use crate::dataset::CleaningReport;
use crate::models::{Diet, N_CLASSES};
use serde::{Deserialize, Serialize};

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_trees: usize,

    /// Seed for bootstrap sampling and feature selection
    pub seed: u64,

    /// Maximum depth (unbounded when `None`)
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node
    pub min_samples_split: usize,

    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,

    /// Features considered per split
    pub max_features: MaxFeatures,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

/// Per-split feature budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Class probabilities for one specimen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DietProbabilities {
    pub herbivore: f64,
    pub carnivore: f64,
}

impl DietProbabilities {
    /// Build from a probability row indexed by label
    pub fn from_row(row: &[f64]) -> Self {
        Self {
            herbivore: row.get(Diet::Herbivore.index()).copied().unwrap_or(0.0),
            carnivore: row.get(Diet::Carnivore.index()).copied().unwrap_or(0.0),
        }
    }

    pub fn of(&self, diet: Diet) -> f64 {
        match diet {
            Diet::Herbivore => self.herbivore,
            Diet::Carnivore => self.carnivore,
        }
    }

    /// Most probable class; ties go to the lower label
    pub fn argmax(&self) -> Diet {
        if self.carnivore > self.herbivore {
            Diet::Carnivore
        } else {
            Diet::Herbivore
        }
    }

    pub fn to_array(&self) -> [f64; N_CLASSES] {
        [self.herbivore, self.carnivore]
    }
}

/// Diet prediction with the confidence of the predicted class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DietPrediction {
    /// Predicted class
    pub diet: Diet,

    /// Probability mass of `diet` (0.0 - 1.0)
    pub confidence: f64,

    /// Both class probabilities
    pub probabilities: DietProbabilities,
}

impl DietPrediction {
    pub fn from_probabilities(probabilities: DietProbabilities) -> Self {
        let diet = probabilities.argmax();
        Self {
            diet,
            confidence: probabilities.of(diet),
            probabilities,
        }
    }
}

/// Summary of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Rows fitted
    pub n_samples: usize,

    /// Rows per class, indexed by label
    pub class_counts: [usize; N_CLASSES],

    /// Trees in the fitted forest
    pub n_trees: usize,

    /// Accuracy on the training rows (informational only)
    pub training_accuracy: f64,

    /// Normalized mean impurity decrease per feature
    pub feature_importances: Vec<f64>,

    /// Cleaning statistics, when training started from a raw dataset
    pub cleaning: Option<CleaningReport>,

    /// Where the artifact was written
    pub artifact_location: String,
}
