//! Pipeline orchestration
//!
//! This module provides the public API for delivery-eta.
//! It orchestrates the full pipeline from raw order input to a rendered estimate.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::encoder::{EncoderConfig, FeatureEncoder};
use crate::error::EtaError;
use crate::features::FeatureDeriver;
use crate::model::{validate_against, LinearRegressor, Regressor};
use crate::predictor::predict;
use crate::schema::{DerivedFeature, FeatureSchema, ModelMetadata};
use crate::types::{
    EstimateReport, PredictionResult, RawOrderInput, ReportFailure, ReportModel, ReportProducer,
};
use crate::{ETA_VERSION, PRODUCER_NAME};

/// Estimate delivery times for JSON input using JSON model artifacts.
///
/// # Arguments
/// * `input_json` - A single order object or an array of orders
/// * `metadata_json` - Model metadata sidecar (feature list and codebook)
/// * `model_json` - Linear model artifact
///
/// # Returns
/// Vector of report JSON strings (one per order). Per-order failures are
/// reported inside the report; only artifact problems fail the whole call.
///
/// # Example
/// ```ignore
/// let reports = predict_json(order_json, metadata_json, model_json)?;
/// ```
pub fn predict_json(
    input_json: String,
    metadata_json: String,
    model_json: String,
) -> Result<Vec<String>, EtaError> {
    let metadata = ModelMetadata::from_json(&metadata_json)?;
    let model = LinearRegressor::from_json(&model_json)?;
    let processor = EtaProcessor::new(&metadata, Arc::new(model))?;

    let inputs = parse_inputs(&input_json)?;
    inputs
        .iter()
        .map(|input| processor.report_json(input))
        .collect()
}

/// Parse a single order object or an array of orders
pub fn parse_inputs(json: &str) -> Result<Vec<RawOrderInput>, EtaError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(EtaError::from))
            .collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Parse NDJSON (newline-delimited JSON) containing one order per line
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawOrderInput>, EtaError> {
    let mut inputs = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawOrderInput>(trimmed) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                return Err(EtaError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(inputs)
}

/// Processor bound to one model and its feature schema.
///
/// Holds no per-request state; share it freely across submissions.
pub struct EtaProcessor {
    encoder: FeatureEncoder,
    model: Arc<dyn Regressor>,
    model_version: String,
    instance_id: String,
}

impl EtaProcessor {
    /// Create a processor that fails on missing features
    pub fn new(metadata: &ModelMetadata, model: Arc<dyn Regressor>) -> Result<Self, EtaError> {
        Self::with_config(metadata, model, EncoderConfig::default())
    }

    /// Create a processor, checking the model against the metadata's schema
    pub fn with_config(
        metadata: &ModelMetadata,
        model: Arc<dyn Regressor>,
        config: EncoderConfig,
    ) -> Result<Self, EtaError> {
        config.validate()?;
        let schema = metadata.schema()?;
        validate_against(model.as_ref(), &schema)?;

        tracing::debug!(
            model = model.name(),
            schema = schema.version(),
            n_features = schema.len(),
            "processor ready"
        );

        Ok(Self {
            encoder: FeatureEncoder::with_config(schema, config),
            model,
            model_version: metadata.version.clone(),
            instance_id: Uuid::new_v4().to_string(),
        })
    }

    /// Load a linear model and its metadata from disk
    pub fn from_paths(
        model_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
        config: EncoderConfig,
    ) -> Result<Self, EtaError> {
        let metadata = ModelMetadata::load(metadata_path)?;
        let model = LinearRegressor::load(model_path)?;
        Self::with_config(&metadata, Arc::new(model), config)
    }

    /// Use a specific instance ID in rendered reports
    pub fn with_instance_id(mut self, instance_id: String) -> Self {
        self.instance_id = instance_id;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.encoder.schema()
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    /// Validate, encode and predict a single order
    pub fn estimate(&self, input: &RawOrderInput) -> PredictionResult {
        let derived = FeatureDeriver::derive(input);
        let vector = self.encoder.encode_with_derived(input, &derived)?;
        let mut estimate = predict(self.model.as_ref(), &vector)?;

        if self.schema().uses(DerivedFeature::DistanceKm) {
            estimate.distance_source = derived.distance_source;
        }

        Ok(estimate)
    }

    /// Estimate and render the outcome, including classified failures
    pub fn report(&self, input: &RawOrderInput) -> EstimateReport {
        let (estimate, failure) = match self.estimate(input) {
            Ok(estimate) => (Some(estimate), None),
            Err(e) => {
                let failure = ReportFailure {
                    code: e.kind().to_string(),
                    message: e.to_string(),
                    recoverable: e.is_user_recoverable(),
                };
                (None, Some(failure))
            }
        };

        EstimateReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ETA_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            model: ReportModel {
                name: self.model.name().to_string(),
                schema_version: self.model_version.clone(),
                n_features: self.model.n_features(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            estimate,
            failure,
        }
    }

    /// Render the report as JSON
    pub fn report_json(&self, input: &RawOrderInput) -> Result<String, EtaError> {
        let report = self.report(input);
        serde_json::to_string_pretty(&report).map_err(EtaError::JsonError)
    }
}
