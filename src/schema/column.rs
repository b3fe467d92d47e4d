//! Feature column definitions
//!
//! Each column name in a model's feature list resolves to exactly one way of
//! producing its value: a numeric pass-through, a codebook lookup, a one-hot
//! indicator, or a derived feature.

use serde::{Deserialize, Serialize};

use crate::codebook::{flag_label, CategoricalField, Codebook};
use crate::error::EtaError;
use crate::types::RawOrderInput;

/// Numeric fields passed through unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    CourierAge,
    CourierRating,
    RestaurantLat,
    RestaurantLon,
    DeliveryLat,
    DeliveryLon,
    MultipleDeliveries,
}

impl NumericField {
    pub const ALL: [NumericField; 7] = [
        NumericField::CourierAge,
        NumericField::CourierRating,
        NumericField::RestaurantLat,
        NumericField::RestaurantLon,
        NumericField::DeliveryLat,
        NumericField::DeliveryLon,
        NumericField::MultipleDeliveries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::CourierAge => "courier_age",
            NumericField::CourierRating => "courier_rating",
            NumericField::RestaurantLat => "restaurant_lat",
            NumericField::RestaurantLon => "restaurant_lon",
            NumericField::DeliveryLat => "delivery_lat",
            NumericField::DeliveryLon => "delivery_lon",
            NumericField::MultipleDeliveries => "multiple_deliveries",
        }
    }

    /// Column name used by the training data set
    pub fn column_name(&self) -> &'static str {
        match self {
            NumericField::CourierAge => "Delivery_person_Age",
            NumericField::CourierRating => "Delivery_person_Ratings",
            NumericField::RestaurantLat => "Restaurant_latitude",
            NumericField::RestaurantLon => "Restaurant_longitude",
            NumericField::DeliveryLat => "Delivery_location_latitude",
            NumericField::DeliveryLon => "Delivery_location_longitude",
            NumericField::MultipleDeliveries => "multiple_deliveries",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.column_name() == name || f.as_str() == name)
    }

    /// Read this field from raw input
    pub fn read(&self, input: &RawOrderInput) -> Option<f64> {
        match self {
            NumericField::CourierAge => input.courier_age.map(f64::from),
            NumericField::CourierRating => input.courier_rating,
            NumericField::RestaurantLat => input.restaurant.map(|c| c.lat),
            NumericField::RestaurantLon => input.restaurant.map(|c| c.lon),
            NumericField::DeliveryLat => input.delivery.map(|c| c.lat),
            NumericField::DeliveryLon => input.delivery.map(|c| c.lon),
            NumericField::MultipleDeliveries => input.multiple_deliveries.map(f64::from),
        }
    }
}

/// Features computed by the deriver rather than read from input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedFeature {
    DistanceKm,
    TimeDeltaMinutes,
}

impl DerivedFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedFeature::DistanceKm => "distance_km",
            DerivedFeature::TimeDeltaMinutes => "time_delta_minutes",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        match name {
            "distance" | "distance_km" | "Distance" => Some(DerivedFeature::DistanceKm),
            "time_diff" | "time_to_pickup_min" | "time_delta_minutes" => {
                Some(DerivedFeature::TimeDeltaMinutes)
            }
            _ => None,
        }
    }
}

/// How a column's value is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric { field: NumericField },
    Categorical { field: CategoricalField },
    Indicator { field: CategoricalField, label: String },
    Derived { feature: DerivedFeature },
}

/// A single named column of a feature schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

impl FeatureColumn {
    /// Resolve a column name against the codebook.
    ///
    /// Indicator columns follow the `<Column>_<Label>` dummy-encoding naming
    /// and must reference a label declared in the codebook.
    pub fn resolve(name: &str, codebook: &Codebook) -> Result<Self, EtaError> {
        let kind = if let Some(field) = NumericField::from_column(name) {
            ColumnKind::Numeric { field }
        } else if let Some(field) = CategoricalField::from_column(name) {
            ColumnKind::Categorical { field }
        } else if let Some(feature) = DerivedFeature::from_column(name) {
            ColumnKind::Derived { feature }
        } else if let Some((field, label)) = split_indicator(name) {
            if label != label.trim() {
                return Err(EtaError::SchemaMismatch(format!(
                    "indicator column {name:?} has whitespace around its label"
                )));
            }
            if !codebook.contains(field, label) {
                return Err(EtaError::SchemaMismatch(format!(
                    "indicator column {name:?} references {label:?}, which is not a {field} category"
                )));
            }
            ColumnKind::Indicator {
                field,
                label: label.to_string(),
            }
        } else {
            return Err(EtaError::SchemaMismatch(format!(
                "unrecognised feature column {name:?}"
            )));
        };

        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }
}

/// Label selected for a categorical field in raw input
pub fn categorical_label(field: CategoricalField, input: &RawOrderInput) -> Option<&str> {
    match field {
        CategoricalField::Weather => input.weather.as_deref(),
        CategoricalField::Traffic => input.traffic.as_deref(),
        CategoricalField::OrderType => input.order_type.as_deref(),
        CategoricalField::Vehicle => input.vehicle.as_deref(),
        CategoricalField::Festival => input.festival.map(flag_label),
    }
}

fn split_indicator(name: &str) -> Option<(CategoricalField, &str)> {
    CategoricalField::ALL.into_iter().find_map(|field| {
        [field.column_name(), field.as_str()]
            .into_iter()
            .find_map(|prefix| {
                name.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .filter(|label| !label.is_empty())
            })
            .map(|label| (field, label))
    })
}
