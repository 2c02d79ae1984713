//! Persistence and cache collaborators.
//!
//! Every store is an explicit async interface so the sizing math never touches
//! I/O or the clock directly. Implementations must be safe to call from
//! concurrent sizing runs; writes are idempotent by key and last write wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    EquipmentCatalogItem, EquipmentCategory, GeoLocation, ProductionEstimate, SizingRecommendation,
    SolarResource,
};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;

/// Previously computed production estimates, reused within a freshness window.
#[async_trait]
pub trait EstimateCache: Send + Sync {
    /// Estimates for a project created at or after `since`, newest first.
    async fn recent_estimates(
        &self,
        project_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductionEstimate>>;

    async fn store_estimate(&self, estimate: &ProductionEstimate) -> Result<()>;
}

/// Monthly irradiance/temperature data keyed by location.
#[async_trait]
pub trait SolarResourceStore: Send + Sync {
    /// Most recent resource within `tolerance_deg` of `location` on both axes.
    async fn find_near(
        &self,
        location: &GeoLocation,
        tolerance_deg: f64,
    ) -> Result<Option<SolarResource>>;

    async fn store_resource(&self, resource: &SolarResource) -> Result<()>;
}

/// Immutable sizing recommendations.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn save_recommendation(&self, recommendation: &SizingRecommendation) -> Result<()>;

    async fn find_recommendation(&self, id: Uuid) -> Result<Option<SizingRecommendation>>;

    /// Newest first.
    async fn recommendations_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SizingRecommendation>>;
}

/// Read-only equipment reference data.
#[async_trait]
pub trait EquipmentCatalog: Send + Sync {
    async fn items(&self, category: EquipmentCategory) -> Result<Vec<EquipmentCatalogItem>>;
}

/// The set of stores a sizing engine runs against.
#[derive(Clone)]
pub struct Repositories {
    pub estimates: Arc<dyn EstimateCache>,
    pub resources: Arc<dyn SolarResourceStore>,
    pub recommendations: Arc<dyn RecommendationStore>,
    pub catalog: Arc<dyn EquipmentCatalog>,
}

impl Repositories {
    /// All four stores backed by one shared store value.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: EstimateCache + SolarResourceStore + RecommendationStore + EquipmentCatalog + 'static,
    {
        Self {
            estimates: store.clone(),
            resources: store.clone(),
            recommendations: store.clone(),
            catalog: store,
        }
    }

    /// Postgres when the `db` feature is on and a URL is configured,
    /// otherwise an in-memory store seeded with `catalog`.
    pub async fn new(cfg: &Config, catalog: Vec<EquipmentCatalogItem>) -> Result<Self> {
        #[cfg(feature = "db")]
        {
            if let Some(url) = cfg.storage.database_url.as_deref() {
                let store = pg::PgStore::connect(url, cfg.storage.max_connections).await?;
                if !catalog.is_empty() {
                    store.upsert_catalog(&catalog).await?;
                }
                return Ok(Self::from_store(Arc::new(store)));
            }
        }

        #[cfg(not(feature = "db"))]
        {
            if cfg.storage.database_url.is_some() {
                tracing::warn!("database_url is set but the db feature is disabled; using in-memory storage");
            }
        }

        let store = MemoryStore::with_catalog(catalog)
            .with_estimate_retention(chrono::Duration::days(cfg.production.freshness_days));
        Ok(Self::from_store(Arc::new(store)))
    }
}
