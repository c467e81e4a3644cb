use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of features per specimen
pub const N_FEATURES: usize = 3;

/// Feature column names, in vector order
pub const FEATURE_NAMES: [&str; N_FEATURES] = ["length_m", "max_ma", "min_ma"];

/// Classifier input: body length and geological age bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Body length in meters
    pub length_m: f64,

    /// Oldest possible age in millions of years ago
    pub max_ma: f64,

    /// Youngest possible age in millions of years ago
    pub min_ma: f64,
}

impl FeatureVector {
    pub fn new(length_m: f64, max_ma: f64, min_ma: f64) -> Self {
        Self {
            length_m,
            max_ma,
            min_ma,
        }
    }

    /// Build from already-typed values, rejecting NaN and infinities
    pub fn checked(length_m: f64, max_ma: f64, min_ma: f64) -> Result<Self> {
        let vector = Self::new(length_m, max_ma, min_ma);
        for (name, value) in FEATURE_NAMES.iter().zip(vector.to_array()) {
            if !value.is_finite() {
                return Err(AppError::invalid_input(*name, "must be a finite number"));
            }
        }
        Ok(vector)
    }

    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [self.length_m, self.max_ma, self.min_ma]
    }
}

/// Untyped prediction request as received from a caller.
///
/// Fields are kept as raw JSON so that a missing or non-numeric value can be
/// reported by name instead of failing deserialization wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFeatures {
    #[serde(default)]
    pub length_m: Option<Value>,
    #[serde(default)]
    pub max_ma: Option<Value>,
    #[serde(default)]
    pub min_ma: Option<Value>,
}

impl RawFeatures {
    fn field(name: &str, value: Option<&Value>) -> Result<f64> {
        match value {
            None | Some(Value::Null) => Err(AppError::invalid_input(name, "field is missing")),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::invalid_input(name, "must be a finite number")),
            Some(other) => Err(AppError::invalid_input(
                name,
                format!("must be a number, got {}", json_kind(other)),
            )),
        }
    }
}

impl TryFrom<RawFeatures> for FeatureVector {
    type Error = AppError;

    fn try_from(raw: RawFeatures) -> Result<Self> {
        Ok(FeatureVector {
            length_m: RawFeatures::field("length_m", raw.length_m.as_ref())?,
            max_ma: RawFeatures::field("max_ma", raw.max_ma.as_ref())?,
            min_ma: RawFeatures::field("min_ma", raw.min_ma.as_ref())?,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
