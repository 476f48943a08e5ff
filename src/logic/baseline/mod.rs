//! Baseline Module - reference distribution for drift detection
//!
//! - `store`: feature store collaborator (get / put / batch-get)
//! - `scaler`: standardization fitted once at startup
//! - `fit`: assembles the reference sample from the store
//! - `types`: reference distribution + fitted bundle

pub mod types;
pub mod scaler;
pub mod store;
pub mod fit;


pub use types::{FittedReference, ReferenceDistribution};
pub use scaler::{ScalerError, StandardScaler, StandardizedVector};
pub use store::{EntityId, FeatureMap, FeatureStore, InMemoryFeatureStore, PgFeatureStore, StoreError};
pub use fit::{FitError, ReferenceFitter, DEFAULT_BATCH_SIZE};
