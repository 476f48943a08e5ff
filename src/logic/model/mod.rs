//! Model Module - artifact retrieval and churn classifiers

pub mod artifact;
pub mod inference;
pub mod lightgbm;
pub mod risk;

pub use artifact::{fetch, sha256_hex, ArtifactError, ArtifactOrigin, ArtifactRef, ModelArtifact};
pub use inference::{
    load_model, ChurnClassifier, ClassProbabilities, LoadedModel, ModelError, ModelFormat, ModelMetadata, OnnxClassifier,
};
pub use lightgbm::TreeEnsemble;
pub use risk::{CustomerStatus, RiskLevel, HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD};
