//! Prediction invocation
//!
//! Wraps a model call in a bounded-failure boundary. Whatever goes wrong inside
//! the model (shape or type errors, panics, non-finite output) is reported as
//! `SchemaMismatch` with the raw message kept for diagnostics. Calls are never
//! retried.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::EtaError;
use crate::model::Regressor;
use crate::types::{DeliveryEstimate, EncodedFeatureVector, PredictionResult};

/// Invoke `model` on an encoded vector
pub fn predict(model: &dyn Regressor, vector: &EncodedFeatureVector) -> PredictionResult {
    if vector.len() != model.n_features() {
        return Err(EtaError::SchemaMismatch(format!(
            "feature length mismatch: got {}, expected {} for model {}",
            vector.len(),
            model.n_features(),
            model.name()
        )));
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| model.predict(vector.as_slice())));

    let minutes = match outcome {
        Ok(Ok(minutes)) => minutes,
        Ok(Err(e)) => {
            tracing::warn!(model = model.name(), error = %e, "model rejected feature vector");
            return Err(EtaError::SchemaMismatch(e.to_string()));
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(model = model.name(), error = %message, "model panicked");
            return Err(EtaError::SchemaMismatch(format!("model panicked: {message}")));
        }
    };

    if !minutes.is_finite() {
        return Err(EtaError::SchemaMismatch(format!(
            "model {} returned non-finite output {minutes}",
            model.name()
        )));
    }

    let minutes = if minutes < 0.0 {
        tracing::warn!(model = model.name(), minutes, "negative prediction clamped to zero");
        0.0
    } else {
        minutes
    };

    tracing::debug!(model = model.name(), minutes, "prediction ok");

    Ok(DeliveryEstimate {
        minutes,
        distance_source: None,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    struct FixedModel {
        width: usize,
        output: f64,
    }

    impl Regressor for FixedModel {
        fn n_features(&self) -> usize {
            self.width
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, ModelError> {
            Ok(self.output)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct PanickingModel;

    impl Regressor for PanickingModel {
        fn n_features(&self) -> usize {
            1
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, ModelError> {
            panic!("tensor shape [1, 3] incompatible");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct FailingModel;

    impl Regressor for FailingModel {
        fn n_features(&self) -> usize {
            1
        }

        fn predict(&self, _features: &[f64]) -> Result<f64, ModelError> {
            Err(ModelError::TypeMismatch { index: 0 })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn vector(values: Vec<f64>) -> EncodedFeatureVector {
        EncodedFeatureVector {
            schema_version: "test".to_string(),
            names: (0..values.len()).map(|i| format!("f{i}")).collect(),
            values,
        }
    }

    #[test]
    fn test_predict_ok() {
        let model = FixedModel {
            width: 2,
            output: 27.5,
        };
        let estimate = predict(&model, &vector(vec![1.0, 2.0])).unwrap();
        assert_eq!(estimate.minutes, 27.5);
    }

    #[test]
    fn test_wrong_length_is_schema_mismatch() {
        let model = FixedModel {
            width: 12,
            output: 27.5,
        };
        let err = predict(&model, &vector(vec![1.0, 2.0])).unwrap_err();
        match err {
            EtaError::SchemaMismatch(msg) => assert!(msg.contains("got 2, expected 12")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_model_error_is_reclassified() {
        let err = predict(&FailingModel, &vector(vec![1.0])).unwrap_err();
        match err {
            EtaError::SchemaMismatch(msg) => assert!(msg.contains("non-numeric")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_model_panic_is_contained() {
        let err = predict(&PanickingModel, &vector(vec![1.0])).unwrap_err();
        match err {
            EtaError::SchemaMismatch(msg) => assert!(msg.contains("incompatible")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_output() {
        let model = FixedModel {
            width: 1,
            output: f64::INFINITY,
        };
        assert!(matches!(
            predict(&model, &vector(vec![1.0])),
            Err(EtaError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_negative_output_clamped() {
        let model = FixedModel {
            width: 1,
            output: -3.0,
        };
        assert_eq!(predict(&model, &vector(vec![1.0])).unwrap().minutes, 0.0);
    }
}
