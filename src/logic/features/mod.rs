//! Features Module - schema registry and request encoding
//!
//! The layout is the single source of truth for column order; the encoder
//! and every downstream component are built from it.

pub mod layout;
pub mod vector;
pub mod encoder;


// Re-export common types
pub use layout::{CategoricalGroup, FeatureKind, FeatureSchema, LayoutInfo, NumericType, SchemaError};
pub use vector::{FeatureVector, LayoutMismatchError};
pub use encoder::{EncodeReport, EncodedFeatures, FeatureEncoder, RawRequest};
