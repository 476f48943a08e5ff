//! Entity feature record (feature store table)

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntityFeatures {
    pub entity_id: String,
    pub features: Json<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl EntityFeatures {
    pub async fn find(pool: &PgPool, entity_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EntityFeatures>("SELECT * FROM entity_features WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_many(pool: &PgPool, entity_ids: &[String]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EntityFeatures>("SELECT * FROM entity_features WHERE entity_id = ANY($1)")
            .bind(entity_ids)
            .fetch_all(pool)
            .await
    }

    pub async fn list_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT entity_id FROM entity_features ORDER BY entity_id")
            .fetch_all(pool)
            .await
    }

    pub async fn upsert(
        pool: &PgPool,
        entity_id: &str,
        features: serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EntityFeatures>(
            r#"
            INSERT INTO entity_features (entity_id, features)
            VALUES ($1, $2)
            ON CONFLICT (entity_id) DO UPDATE SET
                features = EXCLUDED.features,
                updated_at = NOW()
            RETURNING *
            "#
        )
        .bind(entity_id)
        .bind(Json(features))
        .fetch_one(pool)
        .await
    }

    /// Upsert many records in one transaction
    pub async fn upsert_many(
        pool: &PgPool,
        rows: Vec<(String, serde_json::Value)>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;

        for (entity_id, features) in rows {
            written += sqlx::query(
                r#"
                INSERT INTO entity_features (entity_id, features)
                VALUES ($1, $2)
                ON CONFLICT (entity_id) DO UPDATE SET
                    features = EXCLUDED.features,
                    updated_at = NOW()
                "#
            )
            .bind(entity_id)
            .bind(Json(features))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}
