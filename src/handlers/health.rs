//! Health check handler

use axum::{extract::State, Json};

use crate::models::HealthResponse;
use crate::AppState;

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.service().is_some();

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "starting" }.to_string(),
        model_loaded,
        features_count: state.schema.len(),
        schema_version: state.schema.version,
        layout_hash: state.schema.layout_hash(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
