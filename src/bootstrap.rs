//! Startup sequence: schema → feature store → reference fit → model
//!
//! Runs once. Any failure is fatal; the caller exits the process.

use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::logic::baseline::{
    FeatureStore, FitError, InMemoryFeatureStore, PgFeatureStore, ReferenceFitter, StoreError,
};
use crate::logic::features::{FeatureSchema, SchemaError};
use crate::logic::gateway::InferenceService;
use crate::logic::model::{self, ArtifactError, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Feature schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Feature store: {0}")]
    Store(#[from] StoreError),

    #[error("Reference fit: {0}")]
    Fit(#[from] FitError),

    #[error("Model artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Model: {0}")]
    Model(#[from] ModelError),

    #[error("No feature store configured")]
    NoFeatureStore,
}

pub fn load_schema(config: &Config) -> Result<FeatureSchema, StartupError> {
    let schema = match &config.feature_schema_path {
        Some(path) => {
            tracing::info!("Loading feature schema from {}", path.display());
            FeatureSchema::from_json_file(path)?
        }
        None => FeatureSchema::churn_v1(),
    };
    schema.validate()?;

    tracing::info!(
        "Feature schema {} v{}: {} features, layout hash {:08x}",
        schema.name,
        schema.version,
        schema.len(),
        schema.layout_hash()
    );
    Ok(schema)
}

/// Snapshot file wins over the database when both are set
pub async fn open_store(config: &Config) -> Result<Box<dyn FeatureStore>, StartupError> {
    if let Some(path) = &config.feature_store_snapshot {
        tracing::info!("Using feature store snapshot {}", path.display());
        let store = InMemoryFeatureStore::from_snapshot(path)?;
        return Ok(Box::new(store));
    }

    let database_url = config.database_url.as_deref().ok_or(StartupError::NoFeatureStore)?;
    tracing::info!("Feature store database: {}", database_url.split('@').last().unwrap_or("***"));

    let pool = db::create_pool(database_url).await.map_err(StoreError::from)?;
    db::run_migrations(&pool).await.map_err(StoreError::from)?;

    Ok(Box::new(PgFeatureStore::new(pool)))
}

/// Everything after the schema; `schema` comes from `load_schema`
pub async fn build_service(config: &Config, schema: Arc<FeatureSchema>) -> Result<InferenceService, StartupError> {
    let store = open_store(config).await?;
    let fitted = ReferenceFitter::new(&schema, store.as_ref(), config.reference_batch_size)
        .fit()
        .await?;

    let artifact = model::fetch(&config.model_artifact(), config.artifact_timeout).await?;
    let format = config.resolved_model_format();

    let loaded = {
        let schema = Arc::clone(&schema);
        tokio::task::spawn_blocking(move || model::load_model(&artifact, format, &schema))
            .await
            .map_err(|e| ModelError::Parse(format!("model loader stopped: {}", e)))??
    };

    tracing::info!(
        "Drift detector: p_val {} with {} correction over {} reference samples",
        config.drift.p_val,
        config.drift.correction,
        fitted.reference.n_samples()
    );

    Ok(InferenceService::new(schema, fitted, config.drift, loaded))
}
