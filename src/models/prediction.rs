//! API response bodies

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::gateway::PredictionOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: u8,
    pub attrition_probability: f64,
    pub retention_probability: f64,
    pub status: String,
    pub risk_level: String,
    /// `None` when the drift check could not reach a verdict
    pub drift_detected: Option<bool>,
    pub request_id: Uuid,
}

impl From<&PredictionOutcome> for PredictionResponse {
    fn from(outcome: &PredictionOutcome) -> Self {
        Self {
            prediction: outcome.prediction,
            attrition_probability: outcome.probabilities.attrition,
            retention_probability: outcome.probabilities.retention,
            status: outcome.status.as_str().to_string(),
            risk_level: outcome.risk_level.as_str().to_string(),
            drift_detected: outcome.drift_detected(),
            request_id: outcome.request_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub features_count: usize,
    pub schema_version: u8,
    pub layout_hash: u32,
    pub version: String,
    pub timestamp: i64,
}
