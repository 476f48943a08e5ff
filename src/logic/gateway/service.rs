//! Inference Service - the per-request pipeline
//!
//! ```text
//! Received → Encoded → Standardized → DriftChecked → Predicted → Responded
//! ```
//!
//! Built once at startup and shared read-only. Drift is advisory: the model
//! always scores the raw encoded vector and a verdict never blocks the
//! response.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::metrics::ServingMetrics;
use crate::logic::baseline::{FittedReference, StandardScaler};
use crate::logic::drift::{DriftConfig, DriftDetector, DriftOutcome};
use crate::logic::features::{
    EncodeReport, FeatureEncoder, FeatureSchema, LayoutInfo, LayoutMismatchError, RawRequest,
};
use crate::logic::model::{ClassProbabilities, CustomerStatus, LoadedModel, ModelError, ModelMetadata, RiskLevel};

/// Features named in a drift warning
const DRIFT_LOG_FEATURES: usize = 3;

// ============================================================================
// STAGES & ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    Received,
    Encoded,
    Standardized,
    DriftChecked,
    Predicted,
    Responded,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Encoded => "encoded",
            RequestStage::Standardized => "standardized",
            RequestStage::DriftChecked => "drift_checked",
            RequestStage::Predicted => "predicted",
            RequestStage::Responded => "responded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionFailure {
    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model returned a non-finite probability ({0})")]
    NonFiniteProbability(f64),
}

/// Failure tagged with the stage that was being entered
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {kind}")]
pub struct PredictionError {
    pub stage: RequestStage,
    pub kind: PredictionFailure,
}

impl PredictionError {
    fn at(stage: RequestStage, kind: impl Into<PredictionFailure>) -> Self {
        Self { stage, kind: kind.into() }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub request_id: Uuid,
    pub probabilities: ClassProbabilities,
    pub prediction: u8,
    pub status: CustomerStatus,
    pub risk_level: RiskLevel,
    pub drift: DriftOutcome,
    pub encode_report: EncodeReport,
}

impl PredictionOutcome {
    pub fn drift_detected(&self) -> Option<bool> {
        self.drift.is_drift()
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct InferenceService {
    schema: Arc<FeatureSchema>,
    encoder: FeatureEncoder,
    scaler: StandardScaler,
    detector: DriftDetector,
    model: LoadedModel,
    metrics: ServingMetrics,
    reference_samples: usize,
}

impl InferenceService {
    pub fn new(schema: Arc<FeatureSchema>, fitted: FittedReference, drift: DriftConfig, model: LoadedModel) -> Self {
        let reference_samples = fitted.reference.n_samples();

        Self {
            encoder: FeatureEncoder::new(Arc::clone(&schema)),
            scaler: fitted.scaler,
            detector: DriftDetector::new(Arc::new(fitted.reference), drift),
            schema,
            model,
            metrics: ServingMetrics::default(),
            reference_samples,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn layout_info(&self) -> LayoutInfo {
        LayoutInfo::from(self.schema.as_ref())
    }

    pub fn metrics(&self) -> &ServingMetrics {
        &self.metrics
    }

    pub fn model_metadata(&self) -> &ModelMetadata {
        &self.model.metadata
    }

    pub fn reference_samples(&self) -> usize {
        self.reference_samples
    }

    /// Run one request through the pipeline. Counters are updated here.
    pub fn predict(&self, payload: &RawRequest) -> Result<PredictionOutcome, PredictionError> {
        let request_id = Uuid::new_v4();

        match self.run(request_id, payload) {
            Ok(outcome) => {
                self.metrics.record_prediction();
                tracing::info!(
                    request_id = %request_id,
                    attrition = outcome.probabilities.attrition,
                    risk = outcome.risk_level.as_str(),
                    "Prediction served"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.record_error();
                tracing::error!(request_id = %request_id, stage = %e.stage, "Prediction failed: {}", e.kind);
                Err(e)
            }
        }
    }

    fn run(&self, request_id: Uuid, payload: &RawRequest) -> Result<PredictionOutcome, PredictionError> {
        // Received → Encoded: never fails, fallbacks are reported
        let encoded = self.encoder.encode(payload);
        if !encoded.report.is_clean() || !encoded.report.missing.is_empty() {
            tracing::debug!(
                request_id = %request_id,
                missing = ?encoded.report.missing,
                malformed = ?encoded.report.malformed,
                unrecognized = ?encoded.report.unrecognized,
                "Encoding used fallbacks"
            );
        }

        let standardized = self
            .scaler
            .transform(&encoded.vector)
            .map_err(|e| PredictionError::at(RequestStage::Standardized, e))?;

        let drift = self.detector.check(std::slice::from_ref(&standardized));
        match &drift {
            DriftOutcome::Verdict(verdict) if verdict.is_drift => {
                self.metrics.record_drift();
                tracing::warn!(
                    request_id = %request_id,
                    min_p_value = verdict.min_p_value(),
                    threshold = verdict.threshold,
                    top_features = ?verdict.top_features(self.detector.feature_names(), DRIFT_LOG_FEATURES),
                    "Data drift detected"
                );
            }
            DriftOutcome::Verdict(_) => {}
            DriftOutcome::Indeterminate(reason) => {
                self.metrics.record_indeterminate();
                tracing::warn!(request_id = %request_id, "Drift check indeterminate: {}", reason);
                tracing::debug!(
                    request_id = %request_id,
                    features = %encoded.vector.to_log_entry(&self.schema),
                    "Encoded input of indeterminate drift check"
                );
            }
        }

        let probabilities = self
            .model
            .classifier
            .predict_proba(&encoded.vector)
            .map_err(|e| PredictionError::at(RequestStage::Predicted, e))?;

        if !probabilities.attrition.is_finite() {
            return Err(PredictionError::at(
                RequestStage::Predicted,
                PredictionFailure::NonFiniteProbability(probabilities.attrition),
            ));
        }

        let prediction = probabilities.label();

        Ok(PredictionOutcome {
            request_id,
            probabilities,
            prediction,
            status: CustomerStatus::from_label(prediction),
            risk_level: RiskLevel::from_probability(probabilities.attrition),
            drift,
            encode_report: encoded.report,
        })
    }
}

impl fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceService")
            .field("schema", &self.schema.name)
            .field("layout_hash", &self.schema.layout_hash())
            .field("model", &self.model)
            .field("reference_samples", &self.reference_samples)
            .finish()
    }
}
