//! Gateway Module - request pipeline over the startup bundle
//!
//! - `service`: `InferenceService`, stages and per-request outcome
//! - `metrics`: serving counters

pub mod metrics;
pub mod service;

#[cfg(test)]
mod tests;

pub use metrics::{MetricsSnapshot, ServingMetrics};
pub use service::{InferenceService, PredictionError, PredictionFailure, PredictionOutcome, RequestStage};
