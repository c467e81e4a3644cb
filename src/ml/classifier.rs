use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Trait for fitted classifiers served by the inference service
pub trait Classifier: Send + Sync {
    /// Predict class probabilities (n_samples × n_classes, rows sum to 1)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class labels as the argmax of `predict_proba`.
    ///
    /// Ties resolve to the lowest label.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<u8>> {
        let proba = self.predict_proba(features)?;
        proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (idx, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = idx;
                    }
                }
                u8::try_from(best)
                    .map_err(|_| AppError::Internal(format!("class index {} out of range", best)))
            })
            .collect()
    }

    /// Number of input features expected per row
    fn n_features(&self) -> usize;

    /// Short description for status endpoints
    fn summary(&self) -> ModelSummary;
}

/// Model description reported by status endpoints and `inspect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_type: String,
    pub n_trees: Option<usize>,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub feature_importances: Vec<f64>,
}

/// Check that a feature matrix matches what the classifier was fitted on
pub(crate) fn check_width(features: &Array2<f64>, expected: usize) -> Result<()> {
    if features.ncols() != expected {
        return Err(AppError::invalid_input(
            "features",
            format!(
                "expected {} features per row, got {}",
                expected,
                features.ncols()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct FixedClassifier(Array2<f64>);

    impl Classifier for FixedClassifier {
        fn predict_proba(&self, _features: &Array2<f64>) -> Result<Array2<f64>> {
            Ok(self.0.clone())
        }

        fn n_features(&self) -> usize {
            3
        }

        fn summary(&self) -> ModelSummary {
            ModelSummary {
                model_type: "fixed".to_string(),
                n_trees: None,
                n_features: 3,
                feature_names: vec![],
                feature_importances: vec![],
            }
        }
    }

    #[test]
    fn test_default_predict_is_argmax() {
        let classifier = FixedClassifier(array![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]]);
        let labels = classifier.predict(&Array2::zeros((3, 3))).unwrap();
        assert_eq!(labels, vec![0, 1, 0]);
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(&Array2::zeros((2, 3)), 3).is_ok());
        assert!(matches!(
            check_width(&Array2::zeros((2, 2)), 3),
            Err(AppError::InvalidInput { .. })
        ));
    }
}
