//! Churn Prediction - Online Inference Service
//!
//! Scores one customer record per request and checks it for input drift
//! against a reference distribution fitted at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CHURN SERVING                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌────────────┐  ┌────────────────────────┐  │
//! │  │  API      │  │  Encoder   │  │  Drift Detector        │  │
//! │  │  (Axum)   │─▶│  + Scaler  │─▶│  (KS, advisory)        │  │
//! │  └───────────┘  └─────┬──────┘  └────────────────────────┘  │
//! │                       ▼                                     │
//! │                ┌─────────────┐        ┌─────────────────┐   │
//! │                │ Classifier  │        │ Feature Store   │   │
//! │                │ (LGBM/ONNX) │        │ (PostgreSQL)    │   │
//! │                └─────────────┘        └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use once_cell::sync::OnceCell;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use logic::features::FeatureSchema;
use logic::gateway::InferenceService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Loaded before the listener binds, so it is known while starting
    pub schema: Arc<FeatureSchema>,
    service: Arc<OnceCell<Arc<InferenceService>>>,
}

impl AppState {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self {
            schema,
            service: Arc::new(OnceCell::new()),
        }
    }

    /// `None` until startup has published the bundle
    pub fn service(&self) -> Option<Arc<InferenceService>> {
        self.service.get().cloned()
    }

    /// Publish the bundle. Only the first call wins.
    pub fn publish(&self, service: Arc<InferenceService>) -> bool {
        self.service.set(service).is_ok()
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(handlers::predict::predict))
        .route("/health", get(handlers::health::check))
        .route("/metrics", get(handlers::metrics::render))
        .route("/schema", get(handlers::schema::get))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
