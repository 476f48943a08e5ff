//! Prometheus scrape endpoint

use axum::{extract::State, http::header, response::IntoResponse};

use crate::logic::gateway::MetricsSnapshot;
use crate::AppState;

pub async fn render(State(state): State<AppState>) -> impl IntoResponse {
    let body = match state.service() {
        Some(service) => service.metrics().snapshot().render_prometheus(true),
        None => MetricsSnapshot::default().render_prometheus(false),
    };

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
