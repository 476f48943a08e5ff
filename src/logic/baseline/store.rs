//! Feature Store - entity feature mapping persistence (external collaborator)
//!
//! Only the narrow get/put/batch-get surface the serving core consumes.
//! `PgFeatureStore` is the deployed backend; `InMemoryFeatureStore` backs
//! tests and local runs from a JSON snapshot.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::PgPool;

use crate::models::EntityFeatures;

pub type EntityId = String;

/// Stored column name → value mapping of one entity
pub type FeatureMap = HashMap<String, f64>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt feature record for {entity_id}: {reason}")]
    Corrupt { entity_id: String, reason: String },

    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn get_features(&self, entity_id: &str) -> Result<Option<FeatureMap>, StoreError>;

    async fn get_all_entity_ids(&self) -> Result<Vec<EntityId>, StoreError>;

    /// Entities without a stored record are absent from the result
    async fn get_batch_features(&self, entity_ids: &[EntityId]) -> Result<HashMap<EntityId, FeatureMap>, StoreError>;

    async fn store_features(&self, entity_id: &str, features: FeatureMap) -> Result<(), StoreError>;

    async fn store_batch_features(&self, batch: HashMap<EntityId, FeatureMap>) -> Result<(), StoreError>;
}

/// Decode a stored JSON object. Booleans (one-hot columns stored as bool)
/// become 0/1. Strings and nulls (labels, raw categoricals) are dropped;
/// the fitter decides whether a schema column is missing.
pub fn feature_map_from_json(entity_id: &str, value: &Value) -> Result<FeatureMap, StoreError> {
    let object = value.as_object().ok_or_else(|| StoreError::Corrupt {
        entity_id: entity_id.to_string(),
        reason: "record is not an object".to_string(),
    })?;

    Ok(object
        .iter()
        .filter_map(|(column, raw)| {
            let v = match raw {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            };
            if v.is_none() {
                tracing::trace!(entity_id, column = %column, "Skipping non-numeric column");
            }
            v.map(|v| (column.clone(), v))
        })
        .collect())
}

// ============================================================================
// POSTGRES
// ============================================================================

#[derive(Clone)]
pub struct PgFeatureStore {
    pool: PgPool,
}

impl PgFeatureStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeatureStore for PgFeatureStore {
    async fn get_features(&self, entity_id: &str) -> Result<Option<FeatureMap>, StoreError> {
        match EntityFeatures::find(&self.pool, entity_id).await? {
            Some(record) => Ok(Some(feature_map_from_json(&record.entity_id, &record.features.0)?)),
            None => Ok(None),
        }
    }

    async fn get_all_entity_ids(&self) -> Result<Vec<EntityId>, StoreError> {
        Ok(EntityFeatures::list_ids(&self.pool).await?)
    }

    async fn get_batch_features(&self, entity_ids: &[EntityId]) -> Result<HashMap<EntityId, FeatureMap>, StoreError> {
        let records = EntityFeatures::find_many(&self.pool, entity_ids).await?;
        records
            .into_iter()
            .map(|record| {
                let map = feature_map_from_json(&record.entity_id, &record.features.0)?;
                Ok((record.entity_id, map))
            })
            .collect()
    }

    async fn store_features(&self, entity_id: &str, features: FeatureMap) -> Result<(), StoreError> {
        let json = serde_json::to_value(&features)?;
        EntityFeatures::upsert(&self.pool, entity_id, json).await?;
        Ok(())
    }

    async fn store_batch_features(&self, batch: HashMap<EntityId, FeatureMap>) -> Result<(), StoreError> {
        let rows = batch
            .into_iter()
            .map(|(id, features)| Ok((id, serde_json::to_value(&features)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        EntityFeatures::upsert_many(&self.pool, rows).await?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    entries: RwLock<HashMap<EntityId, FeatureMap>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<EntityId, FeatureMap>) -> Self {
        Self { entries: RwLock::new(entries) }
    }

    /// Load a `{ "<entity id>": { "<column>": value, ... }, ... }` snapshot
    pub fn from_snapshot(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: serde_json::Map<String, Value> = serde_json::from_str(&raw)?;

        let entries = parsed
            .iter()
            .map(|(id, record)| Ok((id.clone(), feature_map_from_json(id, record)?)))
            .collect::<Result<HashMap<_, _>, StoreError>>()?;

        tracing::info!("Loaded {} entities from snapshot {}", entries.len(), path.display());
        Ok(Self { entries: RwLock::new(entries) })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn get_features(&self, entity_id: &str) -> Result<Option<FeatureMap>, StoreError> {
        Ok(self.entries.read().get(entity_id).cloned())
    }

    async fn get_all_entity_ids(&self) -> Result<Vec<EntityId>, StoreError> {
        let mut ids: Vec<EntityId> = self.entries.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_batch_features(&self, entity_ids: &[EntityId]) -> Result<HashMap<EntityId, FeatureMap>, StoreError> {
        let entries = self.entries.read();
        Ok(entity_ids
            .iter()
            .filter_map(|id| entries.get(id).map(|f| (id.clone(), f.clone())))
            .collect())
    }

    async fn store_features(&self, entity_id: &str, features: FeatureMap) -> Result<(), StoreError> {
        self.entries.write().insert(entity_id.to_string(), features);
        Ok(())
    }

    async fn store_batch_features(&self, batch: HashMap<EntityId, FeatureMap>) -> Result<(), StoreError> {
        self.entries.write().extend(batch);
        Ok(())
    }
}
