//! delivery-eta - Feature encoding and prediction for delivery-time models
//!
//! The crate turns raw delivery-order attributes into the exact numeric feature
//! vector a trained regression model expects, then invokes the model behind a
//! bounded-failure boundary: raw input → derived features → schema-driven
//! encoding → prediction.
//!
//! ## Modules
//!
//! - **Codebook**: one declared label-to-code table per categorical field
//! - **Schema**: the model's ordered feature list, loaded from its metadata
//! - **Encoder / Predictor**: deterministic encoding and classified prediction failures
//! - **Collaborators**: geocoding and routing seams with degraded fallbacks

pub mod codebook;
pub mod collaborators;
pub mod draft;
pub mod encoder;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use codebook::{CategoricalField, Codebook};
pub use draft::OrderDraft;
pub use encoder::{encode, EncoderConfig, FeatureEncoder, MissingFeaturePolicy};
pub use error::{EtaError, ModelError};
pub use features::{distance_km, time_delta_minutes, FeatureDeriver};
pub use model::{LinearRegressor, Regressor};
pub use pipeline::{predict_json, EtaProcessor};
pub use predictor::predict;
pub use schema::{FeatureSchema, ModelMetadata};
pub use types::{
    Coordinate, DeliveryEstimate, EncodedFeatureVector, PredictionResult, RawOrderInput,
};

/// Crate version embedded in all reports
pub const ETA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "delivery-eta";
