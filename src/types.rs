//! Core types for the delivery-eta pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw order input, derived features, encoded vectors and estimates.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EtaError;

/// Courier age accepted by the entry forms
pub const COURIER_AGE_RANGE: std::ops::RangeInclusive<u32> = 18..=65;

/// Courier rating scale
pub const COURIER_RATING_RANGE: std::ops::RangeInclusive<f64> = 0.0..=5.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(lat: f64, lon: f64) -> Result<Self, EtaError> {
        let coordinate = Self { lat, lon };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<(), EtaError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(EtaError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(EtaError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }
}

/// User-supplied order attributes before encoding.
///
/// Every field is optional because entry modes populate different subsets
/// (manual coordinates, address search, map picks). Which of them are actually
/// required is decided by the model's feature schema at encode time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct RawOrderInput {
    pub courier_age: Option<u32>,
    pub courier_rating: Option<f64>,
    pub restaurant: Option<Coordinate>,
    pub delivery: Option<Coordinate>,
    pub weather: Option<String>,
    pub traffic: Option<String>,
    pub order_type: Option<String>,
    pub vehicle: Option<String>,
    pub multiple_deliveries: Option<u32>,
    pub festival: Option<bool>,
    pub order_date: Option<NaiveDate>,
    pub ordered_at: Option<NaiveTime>,
    pub picked_at: Option<NaiveTime>,
    /// Road distance already resolved by a routing collaborator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_distance_km: Option<f64>,
}

/// Accepted wire form of an order.
///
/// Locations come either as `{"lat", "lon"}` objects or as the training set's
/// flat latitude/longitude columns. Unrecognised keys are rejected so a
/// misspelled field never reads as a missing one.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OrderRecord {
    #[serde(default, alias = "Delivery_person_Age")]
    courier_age: Option<u32>,
    #[serde(default, alias = "Delivery_person_Ratings")]
    courier_rating: Option<f64>,
    #[serde(default)]
    restaurant: Option<Coordinate>,
    #[serde(default, rename = "Restaurant_latitude")]
    restaurant_lat: Option<f64>,
    #[serde(default, rename = "Restaurant_longitude")]
    restaurant_lon: Option<f64>,
    #[serde(default)]
    delivery: Option<Coordinate>,
    #[serde(default, rename = "Delivery_location_latitude")]
    delivery_lat: Option<f64>,
    #[serde(default, rename = "Delivery_location_longitude")]
    delivery_lon: Option<f64>,
    #[serde(default, alias = "Weatherconditions")]
    weather: Option<String>,
    #[serde(default, alias = "Road_traffic_density")]
    traffic: Option<String>,
    #[serde(default, alias = "Type_of_order")]
    order_type: Option<String>,
    #[serde(default, alias = "Type_of_vehicle")]
    vehicle: Option<String>,
    #[serde(default)]
    multiple_deliveries: Option<u32>,
    #[serde(default, alias = "Festival", deserialize_with = "deserialize_flag")]
    festival: Option<bool>,
    #[serde(default, alias = "Order_Date")]
    order_date: Option<NaiveDate>,
    #[serde(default, alias = "Time_Orderd")]
    ordered_at: Option<NaiveTime>,
    #[serde(default, alias = "Time_Order_picked")]
    picked_at: Option<NaiveTime>,
    #[serde(default)]
    routed_distance_km: Option<f64>,
}

impl TryFrom<OrderRecord> for RawOrderInput {
    type Error = EtaError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            courier_age: record.courier_age,
            courier_rating: record.courier_rating,
            restaurant: fold_point(
                "restaurant",
                record.restaurant,
                record.restaurant_lat,
                record.restaurant_lon,
            )?,
            delivery: fold_point(
                "delivery",
                record.delivery,
                record.delivery_lat,
                record.delivery_lon,
            )?,
            weather: record.weather,
            traffic: record.traffic,
            order_type: record.order_type,
            vehicle: record.vehicle,
            multiple_deliveries: record.multiple_deliveries,
            festival: record.festival,
            order_date: record.order_date,
            ordered_at: record.ordered_at,
            picked_at: record.picked_at,
            routed_distance_km: record.routed_distance_km,
        })
    }
}

/// Merge a nested location with its flat latitude/longitude columns
fn fold_point(
    name: &str,
    nested: Option<Coordinate>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<Option<Coordinate>, EtaError> {
    match (nested, lat, lon) {
        (nested, None, None) => Ok(nested),
        (None, Some(lat), Some(lon)) => Ok(Some(Coordinate { lat, lon })),
        (Some(_), _, _) => Err(EtaError::InvalidInput(format!(
            "{name} location given both as an object and as latitude/longitude columns"
        ))),
        (None, _, _) => Err(EtaError::InvalidInput(format!(
            "{name} location needs both latitude and longitude"
        ))),
    }
}

impl RawOrderInput {
    /// Check ranges of the populated fields
    pub fn validate(&self) -> Result<(), EtaError> {
        if let Some(age) = self.courier_age {
            if !COURIER_AGE_RANGE.contains(&age) {
                return Err(EtaError::InvalidInput(format!(
                    "courier age {age} outside {}..={}",
                    COURIER_AGE_RANGE.start(),
                    COURIER_AGE_RANGE.end()
                )));
            }
        }

        if let Some(rating) = self.courier_rating {
            if !COURIER_RATING_RANGE.contains(&rating) {
                return Err(EtaError::InvalidInput(format!(
                    "courier rating {rating} outside {}..={}",
                    COURIER_RATING_RANGE.start(),
                    COURIER_RATING_RANGE.end()
                )));
            }
        }

        if let Some(restaurant) = &self.restaurant {
            restaurant.validate()?;
        }
        if let Some(delivery) = &self.delivery {
            delivery.validate()?;
        }

        if let Some(km) = self.routed_distance_km {
            if !km.is_finite() || km < 0.0 {
                return Err(EtaError::InvalidInput(format!(
                    "routed distance {km} must be a non-negative number"
                )));
            }
        }

        Ok(())
    }
}

/// Accepts `true`/`false` as well as the `"Yes"`/`"No"` labels the forms emit
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
        Label(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(0)) => Ok(Some(false)),
        Some(Flag::Int(1)) => Ok(Some(true)),
        Some(Flag::Int(n)) => Err(serde::de::Error::custom(format!(
            "invalid flag value {n}"
        ))),
        Some(Flag::Label(label)) => match label.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(Some(true)),
            "no" | "false" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "invalid flag label {label:?}"
            ))),
        },
    }
}

/// Where a distance feature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSource {
    /// Road distance returned by a routing collaborator
    Routed,
    /// Great-circle distance computed locally
    Haversine,
}

/// Features computed from raw input rather than supplied directly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Restaurant-to-delivery distance (km)
    pub distance_km: Option<f64>,
    /// Which computation produced `distance_km`
    pub distance_source: Option<DistanceSource>,
    /// Minutes between order and pickup
    pub time_delta_minutes: Option<f64>,
}

/// Ordered numeric features ready for a model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeatureVector {
    /// Version of the feature schema that produced this vector
    pub schema_version: String,
    /// Column names, in model order
    pub names: Vec<String>,
    /// Column values, aligned with `names`
    pub values: Vec<f64>,
}

impl EncodedFeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// A successful delivery-time estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEstimate {
    /// Estimated delivery time in minutes (non-negative)
    pub minutes: f64,
    /// Source of the distance feature, when the model uses one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_source: Option<DistanceSource>,
}

/// Outcome of a prediction: an estimate or a classified failure
pub type PredictionResult = Result<DeliveryEstimate, EtaError>;

/// Producer metadata attached to rendered reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Model identification attached to rendered reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportModel {
    pub name: String,
    pub schema_version: String,
    pub n_features: usize,
}

/// Failure description attached to rendered reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFailure {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

/// Rendered outcome of one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateReport {
    pub producer: ReportProducer,
    pub model: ReportModel,
    pub computed_at_utc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<DeliveryEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReportFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut input = RawOrderInput {
            courier_age: Some(30),
            courier_rating: Some(4.5),
            ..Default::default()
        };
        assert!(input.validate().is_ok());

        input.courier_age = Some(17);
        assert!(matches!(input.validate(), Err(EtaError::InvalidInput(_))));

        input.courier_age = Some(30);
        input.courier_rating = Some(5.1);
        assert!(input.validate().is_err());

        input.courier_rating = Some(4.0);
        input.routed_distance_km = Some(-1.0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_deserialize_training_column_names() {
        let json = r#"{
            "Delivery_person_Age": 30,
            "Delivery_person_Ratings": 4.5,
            "Weatherconditions": "Sunny",
            "Road_traffic_density": "Jam",
            "Festival": "No",
            "multiple_deliveries": 1,
            "restaurant": {"lat": 16.4, "lon": 120.59}
        }"#;
        let input: RawOrderInput = serde_json::from_str(json).unwrap();

        assert_eq!(input.courier_age, Some(30));
        assert_eq!(input.weather.as_deref(), Some("Sunny"));
        assert_eq!(input.traffic.as_deref(), Some("Jam"));
        assert_eq!(input.festival, Some(false));
        assert_eq!(input.restaurant, Some(Coordinate { lat: 16.4, lon: 120.59 }));
        assert!(input.delivery.is_none());
    }

    #[test]
    fn test_deserialize_flat_coordinate_columns() {
        let json = r#"{
            "Restaurant_latitude": 16.40,
            "Restaurant_longitude": 120.59,
            "Delivery_location_latitude": 13.00,
            "Delivery_location_longitude": 77.00
        }"#;
        let input: RawOrderInput = serde_json::from_str(json).unwrap();

        assert_eq!(input.restaurant, Some(Coordinate { lat: 16.40, lon: 120.59 }));
        assert_eq!(input.delivery, Some(Coordinate { lat: 13.00, lon: 77.00 }));
    }

    #[test]
    fn test_flat_coordinate_needs_both_halves() {
        let err = serde_json::from_str::<RawOrderInput>(r#"{"Restaurant_latitude": 16.40}"#)
            .unwrap_err();
        assert!(err.to_string().contains("both latitude and longitude"));

        let twice = r#"{
            "restaurant": {"lat": 16.40, "lon": 120.59},
            "Restaurant_latitude": 16.40,
            "Restaurant_longitude": 120.59
        }"#;
        assert!(serde_json::from_str::<RawOrderInput>(twice).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = serde_json::from_str::<RawOrderInput>(r#"{"Weather": "Foggy"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_serialized_input_reads_back() {
        let input = RawOrderInput {
            courier_age: Some(30),
            restaurant: Some(Coordinate { lat: 12.97, lon: 77.59 }),
            festival: Some(true),
            ordered_at: NaiveTime::from_hms_opt(10, 0, 0),
            ..Default::default()
        };
        let json = serde_json::to_string(&input).unwrap();
        let parsed: RawOrderInput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, input);
    }

    #[test]
    fn test_deserialize_flag_variants() {
        let yes: RawOrderInput = serde_json::from_str(r#"{"festival": "Yes "}"#).unwrap();
        assert_eq!(yes.festival, Some(true));

        let boolean: RawOrderInput = serde_json::from_str(r#"{"festival": false}"#).unwrap();
        assert_eq!(boolean.festival, Some(false));

        let int: RawOrderInput = serde_json::from_str(r#"{"festival": 1}"#).unwrap();
        assert_eq!(int.festival, Some(true));

        assert!(serde_json::from_str::<RawOrderInput>(r#"{"festival": "maybe"}"#).is_err());
    }

    #[test]
    fn test_vector_lookup() {
        let vector = EncodedFeatureVector {
            schema_version: "1".to_string(),
            names: vec!["a".to_string(), "b".to_string()],
            values: vec![1.0, 2.0],
        };
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.get("b"), Some(2.0));
        assert_eq!(vector.get("c"), None);
    }
}
