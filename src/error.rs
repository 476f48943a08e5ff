//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::logic::gateway::{PredictionError, RequestStage};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Startup still in progress
    ServiceUnavailable(String),

    // Unreadable request bodies
    ValidationError(String),

    // Pipeline errors
    PredictionFailed { stage: RequestStage, message: String },

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, stage) = match &self {
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.as_str(), None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str(), None),
            AppError::PredictionFailed { stage, message } => {
                tracing::error!("Prediction failed at {}: {}", stage, message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed", Some(*stage))
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(stage) = stage {
            body["stage"] = json!(stage);
        }

        (status, Json(body)).into_response()
    }
}

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        AppError::PredictionFailed {
            stage: err.stage,
            message: err.kind.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            AppError::InternalError("Prediction worker panicked".to_string())
        } else {
            AppError::InternalError(format!("Prediction worker cancelled: {}", err))
        }
    }
}
