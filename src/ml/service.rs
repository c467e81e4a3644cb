use crate::error::{AppError, Result};
use crate::metrics::{
    MODEL_LOADED, PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS, PREDICTION_ERRORS_TOTAL,
};
use crate::ml::classifier::{Classifier, ModelSummary};
use crate::ml::models::{DietPrediction, DietProbabilities};
use crate::models::{FeatureVector, RawFeatures, N_FEATURES};
use crate::state::ModelStore;
use ndarray::Array2;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Guidance shown whenever no model is available
pub const TRAIN_FIRST_HINT: &str = "Please run the training job first (dino-cli train).";

/// Outcome of the one-time artifact load
enum ModelState {
    Ready(Arc<dyn Classifier>),
    Unavailable { reason: String },
}

/// Diet prediction service.
///
/// The artifact is read from the injected store on first use and cached for
/// the lifetime of the service. When the store has no artifact the service
/// stays in a degraded state and answers every prediction with
/// [`AppError::ModelUnavailable`]. Other load failures (corruption, I/O) are
/// returned to the caller and the load is retried on the next call.
pub struct InferenceService {
    store: Option<Arc<dyn ModelStore>>,
    state: OnceCell<ModelState>,
}

impl InferenceService {
    /// Create a service that lazily loads from `store`
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store: Some(store),
            state: OnceCell::new(),
        }
    }

    /// Create a service around an already-loaded classifier
    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        MODEL_LOADED.set(1.0);
        Self {
            store: None,
            state: OnceCell::with_value(ModelState::Ready(classifier)),
        }
    }

    fn state(&self) -> Result<&ModelState> {
        self.state.get_or_try_init(|| self.load_state())
    }

    fn load_state(&self) -> Result<ModelState> {
        let Some(store) = &self.store else {
            MODEL_LOADED.set(0.0);
            return Ok(ModelState::Unavailable {
                reason: format!("No model store configured. {}", TRAIN_FIRST_HINT),
            });
        };

        match store.read() {
            Ok(forest) => {
                info!(
                    location = %store.location(),
                    n_trees = forest.n_trees(),
                    "Model artifact loaded"
                );
                MODEL_LOADED.set(1.0);
                Ok(ModelState::Ready(Arc::new(forest)))
            }
            Err(AppError::ModelNotFound(detail)) => {
                warn!(
                    location = %store.location(),
                    "Model artifact not found, inference service is degraded"
                );
                MODEL_LOADED.set(0.0);
                Ok(ModelState::Unavailable {
                    reason: format!("Model file not found: {}. {}", detail, TRAIN_FIRST_HINT),
                })
            }
            Err(e) => {
                error!(location = %store.location(), error = %e, "Failed to load model artifact");
                Err(e)
            }
        }
    }

    fn classifier(&self) -> Result<Arc<dyn Classifier>> {
        match self.state()? {
            ModelState::Ready(classifier) => Ok(classifier.clone()),
            ModelState::Unavailable { reason } => Err(AppError::ModelUnavailable(reason.clone())),
        }
    }

    /// Load the artifact now instead of on the first prediction
    pub fn warm_up(&self) -> ModelStatus {
        self.status()
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state(), Ok(ModelState::Ready(_)))
    }

    /// Availability and description of the loaded model
    pub fn status(&self) -> ModelStatus {
        match self.state() {
            Ok(ModelState::Ready(classifier)) => ModelStatus {
                available: true,
                message: "Model loaded".to_string(),
                model: Some(classifier.summary()),
            },
            Ok(ModelState::Unavailable { reason }) => ModelStatus {
                available: false,
                message: reason.clone(),
                model: None,
            },
            Err(e) => ModelStatus {
                available: false,
                message: e.to_string(),
                model: None,
            },
        }
    }

    /// Score one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<DietPrediction> {
        let checked = FeatureVector::checked(features.length_m, features.max_ma, features.min_ma)
            .map_err(record_error)?;
        let mut predictions = self.score(&[checked])?;
        predictions
            .pop()
            .ok_or_else(|| AppError::Internal("classifier returned no rows".to_string()))
    }

    /// Validate and score one untyped request
    pub fn predict_raw(&self, raw: RawFeatures) -> Result<DietPrediction> {
        let features = FeatureVector::try_from(raw).map_err(record_error)?;
        self.predict(&features)
    }

    /// Score N vectors independently, returning N predictions in order
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<DietPrediction>> {
        let checked = batch
            .iter()
            .enumerate()
            .map(|(i, f)| {
                FeatureVector::checked(f.length_m, f.max_ma, f.min_ma)
                    .map_err(|e| prefix_field(e, i))
            })
            .collect::<Result<Vec<_>>>()
            .map_err(record_error)?;
        self.score(&checked)
    }

    /// Validate and score untyped requests; a failing field is reported as
    /// `instances[i].<field>`
    pub fn predict_raw_batch(&self, batch: Vec<RawFeatures>) -> Result<Vec<DietPrediction>> {
        let checked = batch
            .into_iter()
            .enumerate()
            .map(|(i, raw)| FeatureVector::try_from(raw).map_err(|e| prefix_field(e, i)))
            .collect::<Result<Vec<_>>>()
            .map_err(record_error)?;
        self.score(&checked)
    }

    fn score(&self, batch: &[FeatureVector]) -> Result<Vec<DietPrediction>> {
        let classifier = self.classifier().map_err(record_error)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let _timer = PREDICTION_DURATION_SECONDS.start_timer();

        let mut x = Array2::zeros((batch.len(), N_FEATURES));
        for (i, features) in batch.iter().enumerate() {
            for (j, value) in features.to_array().into_iter().enumerate() {
                x[[i, j]] = value;
            }
        }

        let proba = classifier.predict_proba(&x).map_err(record_error)?;
        if proba.nrows() != batch.len() {
            return Err(record_error(AppError::Internal(format!(
                "classifier returned {} rows for {} inputs",
                proba.nrows(),
                batch.len()
            ))));
        }

        let predictions: Vec<DietPrediction> = proba
            .rows()
            .into_iter()
            .map(|row| DietPrediction::from_probabilities(DietProbabilities::from_row(&row.to_vec())))
            .collect();

        for prediction in &predictions {
            PREDICTIONS_TOTAL
                .with_label_values(&[prediction.diet.display_name()])
                .inc();
        }
        debug!(n = predictions.len(), "Scored feature vectors");

        Ok(predictions)
    }
}

fn record_error(e: AppError) -> AppError {
    PREDICTION_ERRORS_TOTAL
        .with_label_values(&[e.error_code()])
        .inc();
    e
}

fn prefix_field(e: AppError, index: usize) -> AppError {
    match e {
        AppError::InvalidInput { field, reason } => AppError::InvalidInput {
            field: format!("instances[{}].{}", index, field),
            reason,
        },
        other => other,
    }
}

/// Model availability as reported to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub available: bool,
    pub message: String,
    #[serde(flatten)]
    pub model: Option<ModelSummary>,
}
