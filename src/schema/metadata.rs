//! Model metadata and feature schema
//!
//! A trained model ships with a metadata sidecar declaring the ordered feature
//! list and the codebook used at training time. The feature schema is built
//! from that sidecar so every encoder call shares one source of truth.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::codebook::Codebook;
use crate::error::EtaError;
use crate::schema::column::{ColumnKind, DerivedFeature, FeatureColumn};

/// Version tag of the reference feature layout
pub const STANDARD_SCHEMA_VERSION: &str = "delivery.features.v1";

/// Column order of the reference delivery-time training set
pub const STANDARD_FEATURES: [&str; 12] = [
    "Delivery_person_Age",
    "Delivery_person_Ratings",
    "Restaurant_latitude",
    "Restaurant_longitude",
    "Delivery_location_latitude",
    "Delivery_location_longitude",
    "Weatherconditions",
    "Road_traffic_density",
    "Type_of_order",
    "Type_of_vehicle",
    "multiple_deliveries",
    "Festival",
];

/// Sidecar metadata shipped alongside a model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Human-readable model name
    pub model_name: String,
    /// Schema version; bumps whenever feat_list or codebook change
    pub version: String,
    /// Authoritative input order
    pub feat_list: Vec<String>,
    /// Declared input width, if recorded separately from feat_list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_dim: Option<usize>,
    /// Training-time categorical encoding
    #[serde(default)]
    pub codebook: Codebook,
}

impl ModelMetadata {
    /// Metadata describing the reference twelve-column layout
    pub fn standard(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            version: STANDARD_SCHEMA_VERSION.to_string(),
            feat_list: STANDARD_FEATURES.iter().map(|s| s.to_string()).collect(),
            in_dim: None,
            codebook: Codebook::standard(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EtaError> {
        let metadata: ModelMetadata = serde_json::from_str(json)?;
        Ok(metadata)
    }

    /// Read metadata from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtaError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            EtaError::ModelUnavailable(format!(
                "failed to read metadata at {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, EtaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the validated feature schema this metadata declares
    pub fn schema(&self) -> Result<FeatureSchema, EtaError> {
        if let Some(in_dim) = self.in_dim {
            if in_dim != self.feat_list.len() {
                return Err(EtaError::SchemaMismatch(format!(
                    "in_dim ({in_dim}) != feat_list.len() ({})",
                    self.feat_list.len()
                )));
            }
        }
        FeatureSchema::new(&self.version, &self.feat_list, self.codebook.clone())
    }
}

/// Ordered feature columns plus the codebook they are encoded with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    version: String,
    columns: Vec<FeatureColumn>,
    codebook: Codebook,
}

impl FeatureSchema {
    /// Resolve and validate every column name
    pub fn new<S: AsRef<str>>(
        version: &str,
        names: &[S],
        codebook: Codebook,
    ) -> Result<Self, EtaError> {
        codebook.validate()?;

        if names.is_empty() {
            return Err(EtaError::SchemaMismatch(
                "feature list is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                return Err(EtaError::SchemaMismatch(format!(
                    "duplicate feature column {name:?}"
                )));
            }
            columns.push(FeatureColumn::resolve(name, &codebook)?);
        }

        Ok(Self {
            version: version.to_string(),
            columns,
            codebook,
        })
    }

    /// Reference twelve-column schema with the standard codebook
    pub fn standard() -> Result<Self, EtaError> {
        Self::new(STANDARD_SCHEMA_VERSION, &STANDARD_FEATURES, Codebook::standard())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn codebook(&self) -> &Codebook {
        &self.codebook
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether any column is computed from `feature`
    pub fn uses(&self, feature: DerivedFeature) -> bool {
        self.columns
            .iter()
            .any(|c| c.kind == ColumnKind::Derived { feature })
    }
}
