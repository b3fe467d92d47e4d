//! Model artifacts
//!
//! A regressor is an opaque, immutable object mapping a feature vector to a
//! duration. It is loaded once and shared for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EtaError, ModelError};
use crate::schema::FeatureSchema;

/// Interface for delivery-time regression models
pub trait Regressor: Send + Sync {
    /// Number of input features the model was trained with
    fn n_features(&self) -> usize;

    /// Predict a duration in minutes
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Get model name
    fn name(&self) -> &str;

    /// Feature names in training order, if the artifact records them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Check that a model's declared inputs line up with a feature schema
pub fn validate_against(model: &dyn Regressor, schema: &FeatureSchema) -> Result<(), EtaError> {
    if model.n_features() != schema.len() {
        return Err(EtaError::SchemaMismatch(format!(
            "model {} expects {} features, schema declares {}",
            model.name(),
            model.n_features(),
            schema.len()
        )));
    }

    if let Some(names) = model.feature_names() {
        for (index, (expected, column)) in names.iter().zip(schema.columns()).enumerate() {
            if expected != &column.name {
                return Err(EtaError::SchemaMismatch(format!(
                    "feature {index} is {:?} in the schema but {expected:?} in model {}",
                    column.name,
                    model.name()
                )));
            }
        }
    }

    Ok(())
}

/// Linear regression artifact stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub name: String,
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegressor {
    /// Parse an artifact, rejecting inconsistent dimensions
    pub fn from_json(json: &str) -> Result<Self, EtaError> {
        let model: LinearRegressor = serde_json::from_str(json)?;
        if model.coefficients.len() != model.feature_names.len() {
            return Err(EtaError::ModelUnavailable(format!(
                "model {} has {} coefficients for {} features",
                model.name,
                model.coefficients.len(),
                model.feature_names.len()
            )));
        }
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EtaError::ModelUnavailable(format!(
                "model {} has non-finite parameters",
                model.name
            )));
        }
        Ok(model)
    }

    /// Load an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtaError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            EtaError::ModelUnavailable(format!("failed to read model at {}: {e}", path.display()))
        })?;
        let model = Self::from_json(&json)?;
        tracing::debug!(
            model = %model.name,
            n_features = model.feature_names.len(),
            "loaded linear model"
        );
        Ok(model)
    }
}

impl Regressor for LinearRegressor {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::ShapeMismatch {
                got: features.len(),
                expected: self.coefficients.len(),
            });
        }
        if let Some(index) = features.iter().position(|x| !x.is_finite()) {
            return Err(ModelError::TypeMismatch { index });
        }

        Ok(self.intercept
            + features
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }
}
