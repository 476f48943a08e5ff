//! Feature layout handler, for callers building request payloads

use axum::{extract::State, Json};

use crate::logic::features::LayoutInfo;
use crate::{AppError, AppResult, AppState};

pub async fn get(State(state): State<AppState>) -> AppResult<Json<LayoutInfo>> {
    let service = state
        .service()
        .ok_or_else(|| AppError::ServiceUnavailable("Service is starting".to_string()))?;

    Ok(Json(service.layout_info()))
}
