//! Prediction handler
//!
//! Accepts a JSON object or an urlencoded form. Scoring runs on the
//! blocking pool; a panic there becomes a 500 and the server keeps serving.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::header,
    Form, Json,
};
use serde_json::Value;

use crate::logic::features::RawRequest;
use crate::models::PredictionResponse;
use crate::{AppError, AppResult, AppState};

pub async fn predict(State(state): State<AppState>, request: Request) -> AppResult<Json<PredictionResponse>> {
    let service = state
        .service()
        .ok_or_else(|| AppError::ServiceUnavailable("Model is still loading".to_string()))?;

    let payload = read_payload(request, &state).await?;

    let worker = Arc::clone(&service);
    let outcome = match tokio::task::spawn_blocking(move || worker.predict(&payload)).await {
        Ok(result) => result?,
        Err(e) => {
            service.metrics().record_error();
            return Err(e.into());
        }
    };

    Ok(Json(PredictionResponse::from(&outcome)))
}

async fn read_payload(request: Request, state: &AppState) -> AppResult<RawRequest> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;

        return Ok(fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect());
    }

    // Anything else is read as JSON, with or without a content type
    let body = Bytes::from_request(request, state)
        .await
        .map_err(|e| AppError::ValidationError(e.body_text()))?;

    let Json(payload) = Json::<RawRequest>::from_bytes(&body)
        .map_err(|e| AppError::ValidationError(e.body_text()))?;

    Ok(payload)
}
