use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{EquipmentCatalog, EstimateCache, RecommendationStore, SolarResourceStore};
use crate::domain::{
    EquipmentCatalogItem, EquipmentCategory, GeoLocation, ProductionEstimate, SizingRecommendation,
    SolarResource,
};

const DEFAULT_ESTIMATE_RETENTION_DAYS: i64 = 7;

/// In-process store implementing every repository trait.
///
/// Locks are synchronous and released before any `.await`. Estimates older
/// than the retention window are dropped whenever a new one is written.
pub struct MemoryStore {
    estimate_retention: Duration,
    estimates: RwLock<HashMap<Uuid, ProductionEstimate>>,
    resources: RwLock<Vec<SolarResource>>,
    recommendations: RwLock<HashMap<Uuid, SizingRecommendation>>,
    catalog: RwLock<Vec<EquipmentCatalogItem>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            estimate_retention: Duration::days(DEFAULT_ESTIMATE_RETENTION_DAYS),
            estimates: RwLock::default(),
            resources: RwLock::default(),
            recommendations: RwLock::default(),
            catalog: RwLock::default(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(items: Vec<EquipmentCatalogItem>) -> Self {
        let store = Self::default();
        *store.catalog.write() = items;
        store
    }

    /// Match this to the estimator's freshness window; older estimates can
    /// never be reused.
    pub fn with_estimate_retention(mut self, retention: Duration) -> Self {
        self.estimate_retention = retention;
        self
    }

    pub fn estimate_count(&self) -> usize {
        self.estimates.read().len()
    }

    pub fn recommendation_count(&self) -> usize {
        self.recommendations.read().len()
    }
}

#[async_trait]
impl EstimateCache for MemoryStore {
    async fn recent_estimates(
        &self,
        project_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductionEstimate>> {
        let mut found: Vec<ProductionEstimate> = self
            .estimates
            .read()
            .values()
            .filter(|e| e.project_id == project_id && e.created_at >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn store_estimate(&self, estimate: &ProductionEstimate) -> Result<()> {
        let mut estimates = self.estimates.write();
        estimates.retain(|_, e| e.is_fresh(estimate.created_at, self.estimate_retention));
        estimates.insert(estimate.id, estimate.clone());
        Ok(())
    }
}

#[async_trait]
impl SolarResourceStore for MemoryStore {
    async fn find_near(
        &self,
        location: &GeoLocation,
        tolerance_deg: f64,
    ) -> Result<Option<SolarResource>> {
        Ok(self
            .resources
            .read()
            .iter()
            .filter(|r| r.location.is_near(location, tolerance_deg))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn store_resource(&self, resource: &SolarResource) -> Result<()> {
        let mut resources = self.resources.write();
        resources.retain(|r| r.id != resource.id);
        resources.push(resource.clone());
        Ok(())
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn save_recommendation(&self, recommendation: &SizingRecommendation) -> Result<()> {
        let mut recs = self.recommendations.write();
        if recs.contains_key(&recommendation.id) {
            anyhow::bail!("recommendation {} already exists", recommendation.id);
        }
        recs.insert(recommendation.id, recommendation.clone());
        Ok(())
    }

    async fn find_recommendation(&self, id: Uuid) -> Result<Option<SizingRecommendation>> {
        Ok(self.recommendations.read().get(&id).cloned())
    }

    async fn recommendations_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SizingRecommendation>> {
        let mut recs: Vec<SizingRecommendation> = self
            .recommendations
            .read()
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        recs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recs)
    }
}

#[async_trait]
impl EquipmentCatalog for MemoryStore {
    async fn items(&self, category: EquipmentCategory) -> Result<Vec<EquipmentCatalogItem>> {
        Ok(self
            .catalog
            .read()
            .iter()
            .filter(|i| i.category == category)
            .cloned()
            .collect())
    }
}
