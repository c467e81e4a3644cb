//! Diet classification model
//!
//! This module provides:
//! - A bagged random forest of CART trees with class probabilities
//! - The `Classifier` seam used by the inference service
//! - The trainer that fits on encoded specimens and writes the artifact
//! - The inference service that loads the artifact once and scores requests

pub mod classifier;
pub mod forest;
pub mod models;
pub mod service;
pub mod trainer;

pub use classifier::{Classifier, ModelSummary};
pub use forest::{DecisionTree, RandomForest};
pub use models::{DietPrediction, DietProbabilities, ForestParams, MaxFeatures, TrainingReport};
pub use service::{InferenceService, ModelStatus, TRAIN_FIRST_HINT};
pub use trainer::Trainer;
