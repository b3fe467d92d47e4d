//! Feature encoding
//!
//! This module turns raw order input into the ordered numeric vector a model
//! expects. Output length and order always match the feature schema.

use serde::{Deserialize, Serialize};

use crate::error::EtaError;
use crate::features::FeatureDeriver;
use crate::schema::{categorical_label, ColumnKind, DerivedFeature, FeatureSchema};
use crate::types::{DerivedFeatures, EncodedFeatureVector, RawOrderInput};

/// What to do when a schema column cannot be produced from the input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    /// Fail with `MissingFeature`
    #[default]
    Fail,
    /// Fill the column with an explicit sentinel value
    Sentinel(f64),
}

/// Encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub missing: MissingFeaturePolicy,
}

impl EncoderConfig {
    /// Fill missing columns with `value`
    pub fn sentinel(value: f64) -> Result<Self, EtaError> {
        let config = Self {
            missing: MissingFeaturePolicy::Sentinel(value),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject non-finite sentinels
    pub fn validate(&self) -> Result<(), EtaError> {
        match self.missing {
            MissingFeaturePolicy::Sentinel(value) if !value.is_finite() => Err(
                EtaError::InvalidInput(format!("missing-feature sentinel {value} is not finite")),
            ),
            _ => Ok(()),
        }
    }
}

/// Encoder bound to one feature schema
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
    config: EncoderConfig,
}

impl FeatureEncoder {
    /// Create an encoder that fails on missing features
    pub fn new(schema: FeatureSchema) -> Self {
        Self::with_config(schema, EncoderConfig::default())
    }

    pub fn with_config(schema: FeatureSchema, config: EncoderConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    /// Encode raw input into the schema's feature vector
    pub fn encode(&self, input: &RawOrderInput) -> Result<EncodedFeatureVector, EtaError> {
        self.encode_with_derived(input, &FeatureDeriver::derive(input))
    }

    /// Encode using features already derived from `input`
    pub fn encode_with_derived(
        &self,
        input: &RawOrderInput,
        derived: &DerivedFeatures,
    ) -> Result<EncodedFeatureVector, EtaError> {
        self.config.validate()?;
        input.validate()?;

        let codebook = self.schema.codebook();
        let mut values = Vec::with_capacity(self.schema.len());

        for column in self.schema.columns() {
            let value = match &column.kind {
                ColumnKind::Numeric { field } => field.read(input),
                ColumnKind::Categorical { field } => match categorical_label(*field, input) {
                    Some(label) => Some(codebook.encode(*field, label)? as f64),
                    None => None,
                },
                ColumnKind::Indicator { field, label } => match categorical_label(*field, input) {
                    Some(selected) => {
                        // Validate the selection even when it is not this column's label
                        codebook.encode(*field, selected)?;
                        Some(if selected.trim() == label.as_str() { 1.0 } else { 0.0 })
                    }
                    None => None,
                },
                ColumnKind::Derived { feature } => match feature {
                    DerivedFeature::DistanceKm => derived.distance_km,
                    DerivedFeature::TimeDeltaMinutes => derived.time_delta_minutes,
                },
            };

            match (value, self.config.missing) {
                (Some(v), _) => values.push(v),
                (None, MissingFeaturePolicy::Sentinel(sentinel)) => {
                    tracing::debug!(column = %column.name, sentinel, "filling missing feature");
                    values.push(sentinel);
                }
                (None, MissingFeaturePolicy::Fail) => {
                    return Err(EtaError::MissingFeature(column.name.clone()));
                }
            }
        }

        tracing::debug!(
            schema = self.schema.version(),
            width = values.len(),
            "encoded feature vector"
        );

        Ok(EncodedFeatureVector {
            schema_version: self.schema.version().to_string(),
            names: self.schema.names(),
            values,
        })
    }
}

/// Encode `input` against `schema`, failing on missing features
pub fn encode(
    input: &RawOrderInput,
    schema: &FeatureSchema,
) -> Result<EncodedFeatureVector, EtaError> {
    FeatureEncoder::new(schema.clone()).encode(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::{CategoricalField, Codebook};
    use crate::types::Coordinate;
    use chrono::{NaiveDate, NaiveTime};

    fn make_test_input() -> RawOrderInput {
        RawOrderInput {
            courier_age: Some(30),
            courier_rating: Some(4.5),
            restaurant: Some(Coordinate::new(16.40, 120.59).unwrap()),
            delivery: Some(Coordinate::new(13.00, 77.00).unwrap()),
            weather: Some("Sunny".to_string()),
            traffic: Some("High".to_string()),
            order_type: Some("Meat".to_string()),
            vehicle: Some("motorcycle".to_string()),
            multiple_deliveries: Some(1),
            festival: Some(false),
            order_date: NaiveDate::from_ymd_opt(2022, 3, 19),
            ordered_at: NaiveTime::from_hms_opt(10, 0, 0),
            picked_at: NaiveTime::from_hms_opt(10, 15, 0),
            routed_distance_km: None,
        }
    }

    #[test]
    fn test_encode_standard_schema() {
        let schema = FeatureSchema::standard().unwrap();
        let vector = encode(&make_test_input(), &schema).unwrap();

        assert_eq!(
            vector.values,
            vec![30.0, 4.5, 16.40, 120.59, 13.00, 77.00, 0.0, 2.0, 0.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(vector.names, schema.names());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let schema = FeatureSchema::new(
            "v",
            &["distance", "time_diff", "Weatherconditions", "Festival_Yes"],
            Codebook::standard(),
        )
        .unwrap();
        let encoder = FeatureEncoder::new(schema);
        let input = make_test_input();

        let first = encoder.encode(&input).unwrap();
        let second = encoder.encode(&input).unwrap();

        let bits = |v: &EncodedFeatureVector| v.values.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_encode_derived_columns() {
        let schema =
            FeatureSchema::new("v", &["time_diff", "distance"], Codebook::standard()).unwrap();
        let vector = encode(&make_test_input(), &schema).unwrap();

        assert_eq!(vector.get("time_diff"), Some(15.0));
        let km = vector.get("distance").unwrap();
        assert!(km > 4600.0 && km < 4800.0);
    }

    #[test]
    fn test_encode_unknown_weather() {
        let schema = FeatureSchema::standard().unwrap();
        let mut input = make_test_input();
        input.weather = Some("Foggy".to_string());

        match encode(&input, &schema).unwrap_err() {
            EtaError::UnknownCategory { field, label } => {
                assert_eq!(field, CategoricalField::Weather);
                assert_eq!(label, "Foggy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_category_fails_even_with_sentinel() {
        let schema = FeatureSchema::standard().unwrap();
        let encoder = FeatureEncoder::with_config(
            schema,
            EncoderConfig {
                missing: MissingFeaturePolicy::Sentinel(-1.0),
            },
        );
        let mut input = make_test_input();
        input.vehicle = Some("bicycle".to_string());

        assert!(matches!(
            encoder.encode(&input),
            Err(EtaError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_missing_distance() {
        let schema =
            FeatureSchema::new("v", &["Delivery_person_Age", "distance"], Codebook::standard())
                .unwrap();
        let input = RawOrderInput {
            courier_age: Some(30),
            ..Default::default()
        };

        match encode(&input, &schema).unwrap_err() {
            EtaError::MissingFeature(name) => assert_eq!(name, "distance"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sentinel_keeps_length() {
        let schema = FeatureSchema::standard().unwrap();
        let encoder = FeatureEncoder::with_config(
            schema.clone(),
            EncoderConfig {
                missing: MissingFeaturePolicy::Sentinel(-1.0),
            },
        );

        let empty = encoder.encode(&RawOrderInput::default()).unwrap();
        assert_eq!(empty.len(), schema.len());
        assert!(empty.values.iter().all(|v| *v == -1.0));

        let full = encoder.encode(&make_test_input()).unwrap();
        assert_eq!(full.len(), schema.len());
    }

    #[test]
    fn test_one_hot_columns() {
        let schema = FeatureSchema::new(
            "v",
            &[
                "Weatherconditions_Sunny",
                "Weatherconditions_Stormy",
                "Road_traffic_density_High",
                "Festival_Yes",
            ],
            Codebook::standard(),
        )
        .unwrap();
        let vector = encode(&make_test_input(), &schema).unwrap();
        assert_eq!(vector.values, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_rejects_undeclared_selection() {
        let schema =
            FeatureSchema::new("v", &["Weatherconditions_Sunny"], Codebook::standard()).unwrap();
        let mut input = make_test_input();
        input.weather = Some("Foggy".to_string());
        assert!(matches!(
            encode(&input, &schema),
            Err(EtaError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_codebook_from_schema_is_used() {
        let mut codebook = Codebook::standard();
        codebook.weather = [("Sunny".to_string(), 1), ("Stormy".to_string(), 0)]
            .into_iter()
            .collect();
        let schema = FeatureSchema::new("v", &["Weatherconditions"], codebook).unwrap();
        let vector = encode(&make_test_input(), &schema).unwrap();
        assert_eq!(vector.values, vec![1.0]);
    }

    #[test]
    fn test_encode_rejects_out_of_range_input() {
        let schema =
            FeatureSchema::new("v", &["Delivery_person_Age", "distance"], Codebook::standard())
                .unwrap();

        let mut input = make_test_input();
        input.restaurant = Some(Coordinate { lat: 200.0, lon: 500.0 });
        assert!(matches!(
            encode(&input, &schema),
            Err(EtaError::InvalidInput(_))
        ));

        let mut input = make_test_input();
        input.courier_age = Some(3);
        assert!(matches!(
            encode(&input, &schema),
            Err(EtaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_finite_sentinel_rejected() {
        assert!(EncoderConfig::sentinel(-1.0).is_ok());
        assert!(EncoderConfig::sentinel(f64::NAN).is_err());
        assert!(EncoderConfig::sentinel(f64::INFINITY).is_err());

        let encoder = FeatureEncoder::with_config(
            FeatureSchema::standard().unwrap(),
            EncoderConfig {
                missing: MissingFeaturePolicy::Sentinel(f64::NAN),
            },
        );
        assert!(matches!(
            encoder.encode(&RawOrderInput::default()),
            Err(EtaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_policy_deserialize() {
        let config: EncoderConfig =
            serde_json::from_str(r#"{"missing": {"policy": "sentinel", "value": -1.0}}"#).unwrap();
        assert_eq!(config.missing, MissingFeaturePolicy::Sentinel(-1.0));

        let config: EncoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.missing, MissingFeaturePolicy::Fail);
    }
}
