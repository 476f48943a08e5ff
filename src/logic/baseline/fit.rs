//! Reference Fitter - startup-only standardization fit
//!
//! Pulls every entity from the feature store, lays each record out in
//! schema order, fits the scaler and keeps the standardized matrix as the
//! drift baseline. Any failure here is fatal: the service must not serve
//! without a baseline.

use super::scaler::{ScalerError, StandardScaler};
use super::store::{EntityId, FeatureStore, StoreError};
use super::types::{FittedReference, ReferenceDistribution};
use crate::logic::features::FeatureSchema;

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("Feature store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Feature store is empty")]
    EmptyStore,

    #[error("None of the {0} listed entities has stored features")]
    NoRecords(usize),

    #[error("Entity {entity_id} is missing schema column {column}")]
    MissingColumn { entity_id: String, column: String },

    #[error("Entity {entity_id} has non-finite value in {column}")]
    NonFinite { entity_id: String, column: String },

    #[error("Standardization fit failed: {0}")]
    Scaler(#[from] ScalerError),
}

pub struct ReferenceFitter<'a> {
    schema: &'a FeatureSchema,
    store: &'a dyn FeatureStore,
    batch_size: usize,
}

impl<'a> ReferenceFitter<'a> {
    pub fn new(schema: &'a FeatureSchema, store: &'a dyn FeatureStore, batch_size: usize) -> Self {
        Self {
            schema,
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn fit(&self) -> Result<FittedReference, FitError> {
        let mut entity_ids = self.store.get_all_entity_ids().await?;
        if entity_ids.is_empty() {
            return Err(FitError::EmptyStore);
        }
        entity_ids.sort();

        tracing::info!(
            "Fitting reference distribution on {} entities (batch size {})",
            entity_ids.len(),
            self.batch_size
        );

        let mut rows = Vec::with_capacity(entity_ids.len());
        let mut skipped = 0;

        for chunk in entity_ids.chunks(self.batch_size) {
            let batch = self.store.get_batch_features(chunk).await?;

            for entity_id in chunk {
                match batch.get(entity_id) {
                    Some(features) => rows.push(self.assemble_row(entity_id, features)?),
                    None => {
                        tracing::warn!("Features not found for entity {}", entity_id);
                        skipped += 1;
                    }
                }
            }
        }

        if rows.is_empty() {
            return Err(FitError::NoRecords(entity_ids.len()));
        }

        let scaler = StandardScaler::fit(self.schema, &rows)?;
        let standardized: Vec<Vec<f64>> = rows.iter().map(|row| scaler.transform_row(row)).collect();

        let reference = ReferenceDistribution::from_rows(
            self.schema.layout_hash(),
            self.schema.order().into_iter().map(String::from).collect(),
            &standardized,
        );

        tracing::info!(
            "Reference distribution ready: {} samples x {} features ({} skipped)",
            reference.n_samples(),
            reference.n_features(),
            skipped
        );

        Ok(FittedReference {
            scaler,
            reference,
            skipped_entities: skipped,
        })
    }

    fn assemble_row(&self, entity_id: &EntityId, features: &super::store::FeatureMap) -> Result<Vec<f64>, FitError> {
        self.schema
            .order()
            .into_iter()
            .map(|column| {
                let value = features.get(column).copied().ok_or_else(|| FitError::MissingColumn {
                    entity_id: entity_id.clone(),
                    column: column.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(FitError::NonFinite {
                        entity_id: entity_id.clone(),
                        column: column.to_string(),
                    });
                }
                Ok(value)
            })
            .collect()
    }
}
