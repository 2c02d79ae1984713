#![cfg(feature = "db")]

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{EquipmentCatalog, EstimateCache, RecommendationStore, SolarResourceStore};
use crate::domain::{
    EquipmentCatalogItem, EquipmentCategory, GeoLocation, ProductionEstimate, SizingRecommendation,
    SolarResource,
};

/// Postgres-backed store. Entities are kept as JSONB payloads next to the
/// columns used for lookups; see `migrations/0001_sizing.sql`.
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("failed to connect to postgres")?;
        Ok(Self { pool })
    }

    pub async fn upsert_catalog(&self, items: &[EquipmentCatalogItem]) -> Result<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO equipment_catalog (id, category, payload)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE SET category = EXCLUDED.category, payload = EXCLUDED.payload
                "#,
            )
            .bind(item.id)
            .bind(item.category.to_string())
            .bind(Json(item))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EstimateCache for PgStore {
    async fn recent_estimates(
        &self,
        project_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductionEstimate>> {
        let rows: Vec<(Json<ProductionEstimate>,)> = sqlx::query_as(
            r#"
            SELECT payload FROM production_estimates
            WHERE project_id = $1 AND created_at >= $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(e),)| e).collect())
    }

    async fn store_estimate(&self, estimate: &ProductionEstimate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO production_estimates (id, project_id, created_at, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload
            "#,
        )
        .bind(estimate.id)
        .bind(estimate.project_id)
        .bind(estimate.created_at)
        .bind(Json(estimate))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SolarResourceStore for PgStore {
    async fn find_near(
        &self,
        location: &GeoLocation,
        tolerance_deg: f64,
    ) -> Result<Option<SolarResource>> {
        let row: Option<(Json<SolarResource>,)> = sqlx::query_as(
            r#"
            SELECT payload FROM solar_resources
            WHERE latitude BETWEEN $1 - $3 AND $1 + $3
              AND longitude BETWEEN $2 - $3 AND $2 + $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(tolerance_deg)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(r),)| r))
    }

    async fn store_resource(&self, resource: &SolarResource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO solar_resources (id, latitude, longitude, created_at, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload
            "#,
        )
        .bind(resource.id)
        .bind(resource.location.latitude)
        .bind(resource.location.longitude)
        .bind(resource.created_at)
        .bind(Json(resource))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecommendationStore for PgStore {
    async fn save_recommendation(&self, recommendation: &SizingRecommendation) -> Result<()> {
        // Recommendations are immutable: a duplicate id is an error, never an update.
        sqlx::query(
            r#"
            INSERT INTO sizing_recommendations (id, project_id, created_at, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(recommendation.id)
        .bind(recommendation.project_id)
        .bind(recommendation.created_at)
        .bind(Json(recommendation))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_recommendation(&self, id: Uuid) -> Result<Option<SizingRecommendation>> {
        let row: Option<(Json<SizingRecommendation>,)> =
            sqlx::query_as("SELECT payload FROM sizing_recommendations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(r),)| r))
    }

    async fn recommendations_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SizingRecommendation>> {
        let rows: Vec<(Json<SizingRecommendation>,)> = sqlx::query_as(
            r#"
            SELECT payload FROM sizing_recommendations
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(r),)| r).collect())
    }
}

#[async_trait]
impl EquipmentCatalog for PgStore {
    async fn items(&self, category: EquipmentCategory) -> Result<Vec<EquipmentCatalogItem>> {
        let rows: Vec<(Json<EquipmentCatalogItem>,)> =
            sqlx::query_as("SELECT payload FROM equipment_catalog WHERE category = $1")
                .bind(category.to_string())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(i),)| i).collect())
    }
}
