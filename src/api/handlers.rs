use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{DietPrediction, DietProbabilities, ModelStatus};
use crate::models::{Diet, RawFeatures};
use axum::{
    extract::{FromRequest, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_available: None,
    })
}

/// Readiness: healthy only when a model is loaded
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let available = state.inference.is_available();
    let status = if available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if available { "ready" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_available: Some(available),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_available: Option<bool>,
}

/// Model availability and description
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.inference.status())
}

/// JSON body extractor whose rejections use the API error envelope
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Predict the diet of one specimen
pub async fn predict(
    State(state): State<AppState>,
    AppJson(request): AppJson<RawFeatures>,
) -> Result<Json<PredictionResponse>> {
    let prediction = state.inference.predict_raw(request)?;
    Ok(Json(PredictionResponse::from(prediction)))
}

/// Predict the diet of several specimens independently
pub async fn predict_batch(
    State(state): State<AppState>,
    AppJson(request): AppJson<BatchPredictRequest>,
) -> Result<Json<BatchPredictResponse>> {
    let predictions = state.inference.predict_raw_batch(request.instances)?;
    Ok(Json(BatchPredictResponse {
        predictions: predictions.into_iter().map(PredictionResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    #[serde(default)]
    pub instances: Vec<RawFeatures>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// "Carnivore" or "Herbivore"
    pub diet: Diet,
    pub confidence: f64,
    pub probabilities: DietProbabilities,
    pub caption: String,
    pub illustration_url: String,
}

impl From<DietPrediction> for PredictionResponse {
    fn from(prediction: DietPrediction) -> Self {
        Self {
            diet: prediction.diet,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
            caption: prediction.diet.caption().to_string(),
            illustration_url: prediction.diet.illustration_url().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<PredictionResponse>,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
