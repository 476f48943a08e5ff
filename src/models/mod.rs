//! Data models

pub mod entity_features;
pub mod prediction;

pub use entity_features::*;
pub use prediction::*;
