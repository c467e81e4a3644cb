//! Prometheus metrics for the inference service.
//!
//! # Example
//! ```no_run
//! use dino_identifier::metrics::PREDICTIONS_TOTAL;
//!
//! PREDICTIONS_TOTAL.with_label_values(&["Carnivore"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "dino_identifier";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Predictions served
    ///
    /// Labels: diet
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of diet predictions served")
            .namespace(NAMESPACE),
        &["diet"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Rejected or failed prediction requests
    ///
    /// Labels: kind (error code)
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed prediction requests")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// Time spent scoring a request (single or batch)
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// 1 when a model artifact is loaded, 0 when degraded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a model artifact is loaded").namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");
}

/// Register all metrics with the global registry.
///
/// Fails with `AlreadyReg` when called twice in one process.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        // Global registry: a second registration in the same process is AlreadyReg
        let result = init_metrics();
        assert!(result.is_ok() || matches!(result, Err(prometheus::Error::AlreadyReg)));
    }

    #[test]
    fn test_prediction_counter() {
        let before = PREDICTIONS_TOTAL.with_label_values(&["Herbivore"]).get();
        PREDICTIONS_TOTAL.with_label_values(&["Herbivore"]).inc();
        assert_eq!(
            PREDICTIONS_TOTAL.with_label_values(&["Herbivore"]).get(),
            before + 1.0
        );
    }

    #[test]
    fn test_gather_contains_namespace() {
        let _ = init_metrics();
        MODEL_LOADED.set(1.0);
        let text = gather_metrics();
        assert!(text.contains("dino_identifier_model_loaded"));
    }
}
