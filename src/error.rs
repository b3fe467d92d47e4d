//! Error types for delivery-eta

use thiserror::Error;

use crate::codebook::CategoricalField;

/// Errors that can occur while encoding inputs or invoking a model
#[derive(Debug, Error)]
pub enum EtaError {
    #[error("Unknown {field} category: {label:?}")]
    UnknownCategory {
        field: CategoricalField,
        label: String,
    },

    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Invalid geocode for {0:?}")]
    InvalidGeocode(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl EtaError {
    /// Stable machine-readable code for this error class
    pub fn kind(&self) -> &'static str {
        match self {
            EtaError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            EtaError::MissingFeature(_) => "MISSING_FEATURE",
            EtaError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            EtaError::CollaboratorUnavailable { .. } => "COLLABORATOR_UNAVAILABLE",
            EtaError::InvalidGeocode(_) => "INVALID_GEOCODE",
            EtaError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            EtaError::InvalidInput(_) => "INVALID_INPUT",
            EtaError::ParseError(_) => "PARSE_ERROR",
            EtaError::JsonError(_) => "JSON_ERROR",
        }
    }

    /// Whether re-prompting the user can fix this error
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            EtaError::UnknownCategory { .. }
                | EtaError::InvalidGeocode(_)
                | EtaError::InvalidInput(_)
        )
    }
}

/// Failures raised by a model implementation itself.
///
/// These never reach callers directly; the prediction invoker reclassifies
/// them as [`EtaError::SchemaMismatch`].
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    ShapeMismatch { got: usize, expected: usize },

    #[error("non-numeric feature at index {index}")]
    TypeMismatch { index: usize },

    #[error("{0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_message() {
        let err = EtaError::UnknownCategory {
            field: CategoricalField::Weather,
            label: "Foggy".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown weather category: \"Foggy\"");
        assert_eq!(err.kind(), "UNKNOWN_CATEGORY");
        assert!(err.is_user_recoverable());
    }

    #[test]
    fn test_schema_mismatch_not_recoverable() {
        let err = EtaError::SchemaMismatch("feature length mismatch".to_string());
        assert!(!err.is_user_recoverable());
        assert_eq!(err.kind(), "SCHEMA_MISMATCH");
    }
}
