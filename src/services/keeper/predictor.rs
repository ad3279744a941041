// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::services::keeper::features::{FEATURE_COUNT, FeatureVector};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Opaque unit-cost model: features in, predicted gwei out.
pub trait CostPredictor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, AppError>;
}

impl<P: CostPredictor + ?Sized> CostPredictor for Box<P> {
    fn predict(&self, features: &FeatureVector) -> Result<f64, AppError> {
        (**self).predict(features)
    }
}

/// `{ "weights": [f64; 6], "intercept": f64 }`
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LinearCostModel {
    weights: [f64; FEATURE_COUNT],
    #[serde(default)]
    intercept: f64,
}

impl LinearCostModel {
    pub fn new(weights: [f64; FEATURE_COUNT], intercept: f64) -> Result<Self, AppError> {
        let model = Self { weights, intercept };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Initialization(format!("Read model {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            AppError::Initialization(msg) => {
                AppError::Initialization(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let model: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::Initialization(format!("Malformed model: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.weights.iter().all(|w| w.is_finite()) && self.intercept.is_finite() {
            Ok(())
        } else {
            Err(AppError::Initialization(
                "Model coefficients must be finite".into(),
            ))
        }
    }
}

impl CostPredictor for LinearCostModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, AppError> {
        let value = self
            .weights
            .iter()
            .zip(features.as_slice())
            .fold(self.intercept, |acc, (w, x)| acc + w * x);
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Prediction(format!(
                "model produced unusable value {value}"
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn features(current: f64) -> FeatureVector {
        FeatureVector([current, 12.0, 2.0, 6.0, current, current])
    }

    #[test]
    fn linear_prediction_is_dot_plus_intercept() {
        let model = LinearCostModel::new([0.5, 0.0, 0.0, 0.0, 0.25, 0.25], 3.0).unwrap();
        assert_eq!(model.predict(&features(40.0)).unwrap(), 43.0);
    }

    #[test]
    fn negative_prediction_is_an_error() {
        let model = LinearCostModel::new([0.0; FEATURE_COUNT], -1.0).unwrap();
        assert!(matches!(
            model.predict(&features(1.0)),
            Err(AppError::Prediction(_))
        ));
    }

    #[test]
    fn non_finite_prediction_is_an_error() {
        let model = LinearCostModel::new([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0.0).unwrap();
        assert!(model.predict(&features(f64::INFINITY)).is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"weights":[1.0,0.0,0.0,0.0,0.0,0.0],"intercept":0.5}}"#
        )
        .unwrap();
        let model = LinearCostModel::load(file.path()).unwrap();
        assert_eq!(model.predict(&features(10.0)).unwrap(), 10.5);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = LinearCostModel::from_json(r#"{"weights":[1.0,2.0],"intercept":0}"#);
        assert!(matches!(err, Err(AppError::Initialization(_))));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = LinearCostModel::load(Path::new("/nonexistent/gas_predictor.json"));
        assert!(matches!(err, Err(AppError::Initialization(_))));
    }
}
