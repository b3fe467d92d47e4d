//! Categorical codebook
//!
//! Fixed label-to-integer tables for every categorical delivery field. A single
//! codebook is declared per model artifact and shared by every encoder call:
//! - Labels outside a field's domain fail with `UnknownCategory`
//! - Codes are distinct within a field
//! - Labels are matched exactly after trimming surrounding whitespace

use crate::error::EtaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Categorical fields understood by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Weather,
    Traffic,
    OrderType,
    Vehicle,
    Festival,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Weather,
        CategoricalField::Traffic,
        CategoricalField::OrderType,
        CategoricalField::Vehicle,
        CategoricalField::Festival,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalField::Weather => "weather",
            CategoricalField::Traffic => "traffic",
            CategoricalField::OrderType => "order_type",
            CategoricalField::Vehicle => "vehicle",
            CategoricalField::Festival => "festival",
        }
    }

    /// Column name used by the training data set
    pub fn column_name(&self) -> &'static str {
        match self {
            CategoricalField::Weather => "Weatherconditions",
            CategoricalField::Traffic => "Road_traffic_density",
            CategoricalField::OrderType => "Type_of_order",
            CategoricalField::Vehicle => "Type_of_vehicle",
            CategoricalField::Festival => "Festival",
        }
    }

    /// Resolve a training column name (or snake_case alias) to a field
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.column_name() == name || f.as_str() == name)
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label-to-code tables, one per categorical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codebook {
    pub weather: BTreeMap<String, i64>,
    pub traffic: BTreeMap<String, i64>,
    pub order_type: BTreeMap<String, i64>,
    pub vehicle: BTreeMap<String, i64>,
    pub festival: BTreeMap<String, i64>,
}

impl Default for Codebook {
    fn default() -> Self {
        Self::standard()
    }
}

impl Codebook {
    /// Encoding used by the reference delivery-time training set
    pub fn standard() -> Self {
        Self {
            weather: table(&["Sunny", "Stormy", "Rainy", "Cloudy"]),
            traffic: table(&["Low", "Medium", "High", "Jam"]),
            order_type: table(&["Meat", "Vegetables", "Fruits and Vegetables"]),
            vehicle: table(&["motorcycle", "truck"]),
            festival: table(&["No", "Yes"]),
        }
    }

    /// Parse a codebook from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, EtaError> {
        let codebook: Codebook = serde_json::from_str(json)?;
        codebook.validate()?;
        Ok(codebook)
    }

    /// Table for a single field
    pub fn table(&self, field: CategoricalField) -> &BTreeMap<String, i64> {
        match field {
            CategoricalField::Weather => &self.weather,
            CategoricalField::Traffic => &self.traffic,
            CategoricalField::OrderType => &self.order_type,
            CategoricalField::Vehicle => &self.vehicle,
            CategoricalField::Festival => &self.festival,
        }
    }

    /// Encode a label for `field`, failing on labels outside its domain
    pub fn encode(&self, field: CategoricalField, label: &str) -> Result<i64, EtaError> {
        self.table(field)
            .get(label.trim())
            .copied()
            .ok_or_else(|| EtaError::UnknownCategory {
                field,
                label: label.to_string(),
            })
    }

    /// Encode a boolean flag through the festival table
    pub fn encode_flag(&self, flag: bool) -> Result<i64, EtaError> {
        self.encode(CategoricalField::Festival, flag_label(flag))
    }

    /// Whether `label` is part of the domain of `field`
    pub fn contains(&self, field: CategoricalField, label: &str) -> bool {
        self.table(field).contains_key(label.trim())
    }

    /// Labels of a field, ordered by code
    pub fn labels(&self, field: CategoricalField) -> Vec<&str> {
        let mut entries: Vec<(&String, &i64)> = self.table(field).iter().collect();
        entries.sort_by_key(|(_, code)| **code);
        entries.into_iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Check every table is non-empty and has distinct codes
    pub fn validate(&self) -> Result<(), EtaError> {
        for field in CategoricalField::ALL {
            let table = self.table(field);
            if table.is_empty() {
                return Err(EtaError::SchemaMismatch(format!(
                    "codebook for {field} is empty"
                )));
            }

            let mut seen: BTreeMap<i64, &str> = BTreeMap::new();
            for (label, code) in table {
                if label.trim().is_empty() || label.trim() != label {
                    return Err(EtaError::SchemaMismatch(format!(
                        "codebook for {field} has malformed label {label:?}"
                    )));
                }
                if let Some(previous) = seen.insert(*code, label) {
                    return Err(EtaError::SchemaMismatch(format!(
                        "codebook for {field} maps both {previous:?} and {label:?} to {code}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Label used for boolean flags in the festival table
pub fn flag_label(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn table(labels: &[&str]) -> BTreeMap<String, i64> {
    labels
        .iter()
        .enumerate()
        .map(|(code, label)| (label.to_string(), code as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_weather_codes() {
        let codebook = Codebook::standard();
        assert_eq!(codebook.encode(CategoricalField::Weather, "Sunny").unwrap(), 0);
        assert_eq!(codebook.encode(CategoricalField::Weather, "Stormy").unwrap(), 1);
        assert_eq!(codebook.encode(CategoricalField::Weather, "Rainy").unwrap(), 2);
        assert_eq!(codebook.encode(CategoricalField::Weather, "Cloudy").unwrap(), 3);
    }

    #[test]
    fn test_unknown_label_is_not_zero() {
        let codebook = Codebook::standard();
        let err = codebook
            .encode(CategoricalField::Weather, "Foggy")
            .unwrap_err();

        match err {
            EtaError::UnknownCategory { field, label } => {
                assert_eq!(field, CategoricalField::Weather);
                assert_eq!(label, "Foggy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_labels_are_trimmed() {
        let codebook = Codebook::standard();
        assert_eq!(codebook.encode(CategoricalField::Traffic, "Jam ").unwrap(), 3);
        assert!(codebook.encode(CategoricalField::Traffic, "jam").is_err());
    }

    #[test]
    fn test_every_domain_has_distinct_stable_codes() {
        let codebook = Codebook::standard();
        for field in CategoricalField::ALL {
            let labels = codebook.labels(field);
            let mut codes: Vec<i64> = labels
                .iter()
                .map(|l| codebook.encode(field, l).unwrap())
                .collect();
            let again: Vec<i64> = labels
                .iter()
                .map(|l| codebook.encode(field, l).unwrap())
                .collect();
            assert_eq!(codes, again);

            codes.dedup();
            assert_eq!(codes.len(), labels.len(), "duplicate codes in {field}");
        }
    }

    #[test]
    fn test_festival_flag() {
        let codebook = Codebook::standard();
        assert_eq!(codebook.encode_flag(false).unwrap(), 0);
        assert_eq!(codebook.encode_flag(true).unwrap(), 1);
    }

    #[test]
    fn test_labels_in_code_order() {
        let codebook = Codebook::standard();
        assert_eq!(
            codebook.labels(CategoricalField::Traffic),
            vec!["Low", "Medium", "High", "Jam"]
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_codes() {
        let mut codebook = Codebook::standard();
        codebook.vehicle.insert("scooter".to_string(), 0);
        let err = codebook.validate().unwrap_err();
        assert!(matches!(err, EtaError::SchemaMismatch(_)));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let mut codebook = Codebook::standard();
        codebook.order_type.clear();
        assert!(codebook.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "weather": {"Sunny": 1, "Stormy": 0},
            "traffic": {"Low": 0},
            "order_type": {"Meat": 0},
            "vehicle": {"truck": 0},
            "festival": {"No": 0, "Yes": 1}
        }"#;
        let codebook = Codebook::from_json(json).unwrap();
        assert_eq!(codebook.encode(CategoricalField::Weather, "Sunny").unwrap(), 1);
        assert_eq!(codebook.labels(CategoricalField::Weather), vec!["Stormy", "Sunny"]);
    }

    #[test]
    fn test_field_from_column() {
        assert_eq!(
            CategoricalField::from_column("Road_traffic_density"),
            Some(CategoricalField::Traffic)
        );
        assert_eq!(
            CategoricalField::from_column("order_type"),
            Some(CategoricalField::OrderType)
        );
        assert_eq!(CategoricalField::from_column("Delivery_person_Age"), None);
    }
}
