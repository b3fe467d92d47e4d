//! Feature schema declared by a model artifact
//!
//! This module resolves a model's ordered feature list into typed columns and
//! ties them to the codebook the model was trained with.

mod column;
mod metadata;

pub use column::*;
pub use metadata::*;
