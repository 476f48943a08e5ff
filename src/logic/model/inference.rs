//! Inference Engine - classifier seam and ONNX Runtime backend
//!
//! Every backend answers the same question: the two class probabilities
//! for one schema-ordered feature vector.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::artifact::ModelArtifact;
use super::lightgbm::TreeEnsemble;
use crate::logic::features::{FeatureSchema, FeatureVector, SchemaError};

// ============================================================================
// TYPES
// ============================================================================

/// Class 0 = retained, class 1 = attrited
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub retention: f64,
    pub attrition: f64,
}

impl ClassProbabilities {
    pub fn from_attrition(attrition: f64) -> Self {
        let attrition = attrition.clamp(0.0, 1.0);
        Self {
            retention: 1.0 - attrition,
            attrition,
        }
    }

    /// Predicted class at the 0.5 decision boundary
    pub fn label(&self) -> u8 {
        u8::from(self.attrition > 0.5)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Unsupported model: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse model: {0}")]
    Parse(String),

    #[error("Model expects {expected} features, got {actual}")]
    Width { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Binary churn classifier, shared across request threads
pub trait ChurnClassifier: Send + Sync {
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities, ModelError>;

    fn n_features(&self) -> usize;

    /// Training-time column names, when the artifact records them
    fn feature_names(&self) -> Option<&[String]>;

    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// LightGBM `dump_model()` JSON
    Lightgbm,
    Onnx,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ModelFormat::Lightgbm),
            "onnx" => Some(ModelFormat::Onnx),
            _ => None,
        }
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightgbm" | "json" => Ok(ModelFormat::Lightgbm),
            "onnx" => Ok(ModelFormat::Onnx),
            other => Err(format!("unknown model format '{}', expected lightgbm or onnx", other)),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::Lightgbm => write!(f, "lightgbm"),
            ModelFormat::Onnx => write!(f, "onnx"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub format: ModelFormat,
    pub origin: String,
    pub sha256: String,
    pub n_features: usize,
    pub loaded_at: DateTime<Utc>,
}

pub struct LoadedModel {
    pub classifier: Box<dyn ChurnClassifier>,
    pub metadata: ModelMetadata,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("kind", &self.classifier.kind())
            .field("metadata", &self.metadata)
            .finish()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Build a classifier from fetched bytes and check it against the schema
pub fn load_model(artifact: &ModelArtifact, format: ModelFormat, schema: &FeatureSchema) -> Result<LoadedModel, ModelError> {
    tracing::info!("Loading {} model from {} ({} bytes)", format, artifact.origin, artifact.bytes.len());

    let classifier: Box<dyn ChurnClassifier> = match format {
        ModelFormat::Lightgbm => Box::new(TreeEnsemble::from_slice(&artifact.bytes)?),
        ModelFormat::Onnx => Box::new(OnnxClassifier::from_bytes(&artifact.bytes, schema.len())?),
    };

    if classifier.n_features() != schema.len() {
        return Err(SchemaError::ModelWidth {
            expected: classifier.n_features(),
            actual: schema.len(),
        }
        .into());
    }

    if let Some(names) = classifier.feature_names() {
        schema.verify_model_features(names)?;
    }

    let metadata = ModelMetadata {
        format,
        origin: artifact.origin.to_string(),
        sha256: artifact.sha256.clone(),
        n_features: classifier.n_features(),
        loaded_at: Utc::now(),
    };

    tracing::info!("Model ready: {} with {} features", classifier.kind(), metadata.n_features);

    Ok(LoadedModel { classifier, metadata })
}

// ============================================================================
// ONNX
// ============================================================================

/// Classifier exported with a `probabilities` float output of shape [1, 2]
pub struct OnnxClassifier {
    session: Mutex<Session>,
    n_features: usize,
}

impl OnnxClassifier {
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(|e| ModelError::Parse(format!("Session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Parse(format!("Optimization error: {}", e)))?
            .commit_from_memory(model_bytes)
            .map_err(|e| ModelError::Parse(format!("Load from memory error: {}", e)))?;

        if session.inputs.len() != 1 {
            return Err(ModelError::UnsupportedFormat(format!(
                "expected a single input tensor, found {}",
                session.inputs.len()
            )));
        }

        Ok(Self {
            session: Mutex::new(session),
            n_features,
        })
    }
}

impl ChurnClassifier for OnnxClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::Width {
                expected: self.n_features,
                actual: features.len(),
            });
        }

        let input_array = Array2::<f32>::from_shape_vec((1, self.n_features), features.to_f32())
            .map_err(|e| ModelError::Inference(format!("Array error: {}", e)))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| ModelError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "probabilities")
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::Inference("No output defined".to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| ModelError::Inference(format!("Missing output '{}'", output_name)))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("Extract error: {}", e)))?;

        let data = output_tensor.1;
        let attrition = match data {
            [_, p1, ..] => *p1,
            [p1] => *p1,
            [] => return Err(ModelError::Inference("Empty probability output".to_string())),
        };

        Ok(ClassProbabilities::from_attrition(f64::from(attrition)))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}
