use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::alternatives::generate_alternatives;
use super::targets::{derive_targets, inverter_target};
use crate::config::{Config, SizingConstraints};
use crate::domain::{
    AutonomyBasis, BackupAnalysis, BackupRequirements, BillRecord, EquipmentCategory,
    EquipmentSelection, GeoLocation, LoadProfile, SizingGoal, SizingRecommendation,
    SystemConfiguration, Tariff,
};
use crate::equipment::{EquipmentError, EquipmentPreferences, EquipmentSelector, SelectorLimits};
use crate::finance::{FinanceError, FinancialAnalyzer};
use crate::load_profile::{LoadProfileBuilder, LoadProfileError};
use crate::production::{ProductionError, ProductionEstimator, ProductionRequest};
use crate::repo::{EquipmentCatalog, RecommendationStore, Repositories};
use crate::tariff::{TariffLookup, TariffQuery};

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("project {project_id}: no load profile and no bill history to build one")]
    MissingLoadData { project_id: Uuid },

    #[error("project {project_id}: no compliant {category} equipment available")]
    NoEquipment {
        project_id: Uuid,
        category: EquipmentCategory,
    },

    #[error("load profile: {0}")]
    LoadProfile(#[from] LoadProfileError),

    #[error("equipment selection: {0}")]
    Equipment(#[from] EquipmentError),

    #[error("production estimate: {0}")]
    Production(#[from] ProductionError),

    #[error("financial analysis: {0}")]
    Finance(#[from] FinanceError),

    #[error("persistence: {0}")]
    Persistence(anyhow::Error),
}

/// Everything one sizing run needs about a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingRequest {
    pub project_id: Uuid,
    /// Used as-is when present; otherwise built from `bills`
    #[serde(default)]
    pub load_profile: Option<LoadProfile>,
    #[serde(default)]
    pub bills: Vec<BillRecord>,
    #[serde(default)]
    pub tariff: Option<Tariff>,
    pub location: GeoLocation,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub goals: Vec<SizingGoal>,
    #[serde(default)]
    pub backup: BackupRequirements,
    #[serde(default)]
    pub preferences: EquipmentPreferences,
}

/// Additive weights behind the recommendation confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfidenceWeights {
    pub base: f64,
    pub load_profile: f64,
    pub production: f64,
    /// Flat credit for equipment availability
    pub equipment: f64,
    pub goals_stated: f64,
    /// Scaled by bill count / 12
    pub bill_coverage: f64,
}

impl Default for SizingConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.7,
            load_profile: 0.3,
            production: 0.2,
            equipment: 0.1,
            goals_stated: 0.1,
            bill_coverage: 0.1,
        }
    }
}

impl SizingConfidenceWeights {
    pub fn aggregate(
        &self,
        load_confidence: f64,
        production_confidence: f64,
        goals_stated: bool,
        bill_count: usize,
    ) -> f64 {
        let mut score = self.base
            + self.load_profile * load_confidence
            + self.production * production_confidence
            + self.equipment;
        if goals_stated {
            score += self.goals_stated;
        }
        score += self.bill_coverage * (bill_count as f64 / 12.0).min(1.0);
        score.clamp(0.0, 1.0)
    }
}

/// Runs the sizing pipeline for one project at a time; concurrent runs share
/// only the stores.
pub struct SizingEngine {
    constraints: SizingConstraints,
    builder: LoadProfileBuilder,
    selector: EquipmentSelector,
    estimator: ProductionEstimator,
    analyzer: FinancialAnalyzer,
    tariffs: Arc<dyn TariffLookup>,
    catalog: Arc<dyn EquipmentCatalog>,
    recommendations: Arc<dyn RecommendationStore>,
    weights: SizingConfidenceWeights,
}

impl SizingEngine {
    pub fn new(
        cfg: &Config,
        estimator: ProductionEstimator,
        repos: &Repositories,
        tariffs: Arc<dyn TariffLookup>,
    ) -> Self {
        Self {
            constraints: cfg.sizing.clone(),
            builder: LoadProfileBuilder::default(),
            selector: EquipmentSelector::new(SelectorLimits::from(&cfg.sizing)),
            estimator,
            analyzer: FinancialAnalyzer::new(cfg.finance.clone()),
            tariffs,
            catalog: repos.catalog.clone(),
            recommendations: repos.recommendations.clone(),
            weights: SizingConfidenceWeights::default(),
        }
    }

    /// Engine backed by the configured production service.
    pub fn from_config(
        cfg: &Config,
        repos: &Repositories,
        tariffs: Arc<dyn TariffLookup>,
    ) -> Result<Self, SizingError> {
        let estimator = ProductionEstimator::from_config(&cfg.production, repos)?;
        Ok(Self::new(cfg, estimator, repos, tariffs))
    }

    pub async fn size(&self, request: &SizingRequest) -> Result<SizingRecommendation, SizingError> {
        let project_id = request.project_id;
        info!(%project_id, goals = ?request.goals, "sizing run started");

        let load = self.acquire_load_profile(request)?;
        debug!(%project_id, annual_kwh = load.annual_kwh, peak_kw = load.peak_kw, "load profile ready");

        let tariff = self.resolve_tariff(request, &load).await;

        let mut targets = derive_targets(&load, &request.goals, &request.backup, &self.constraints);
        info!(
            %project_id,
            solar_kw = targets.solar_kw,
            battery_kwh = ?targets.battery_kwh,
            inverter_kw = targets.inverter_kw,
            "sizing targets derived"
        );

        let equipment = self.select_equipment(request, targets.solar_kw, targets.battery_kwh).await?;
        let solar_kw = equipment.panels.achieved_size;
        let battery_kwh = equipment.batteries.as_ref().map(|b| b.achieved_size);
        let inverter_kw = equipment.inverters.achieved_size;
        // Re-derived from the achieved array and battery
        targets.inverter_kw = equipment.inverters.target_size;

        let production_request = ProductionRequest::new(
            project_id,
            solar_kw,
            SystemConfiguration::for_latitude(request.location.latitude),
            request.location.clone(),
        );
        let estimate = self.estimator.estimate(&production_request).await?;
        info!(
            %project_id,
            annual_kwh = estimate.annual_kwh,
            method = %estimate.method,
            confidence = estimate.confidence,
            "production estimated"
        );

        let system_cost = equipment.total_cost()
            + solar_kw * 1000.0 * self.constraints.installation_cost_per_watt;
        let financials =
            self.analyzer
                .analyze(system_cost, estimate.annual_kwh, &load, tariff.as_ref())?;

        let backup = equipment
            .batteries
            .as_ref()
            .map(|b| self.backup_analysis(b.achieved_size, &request.backup, targets.backup_hours));

        let confidence = self.weights.aggregate(
            load.confidence,
            estimate.confidence,
            !request.goals.is_empty(),
            load.bill_count,
        );

        let recommendation = SizingRecommendation {
            id: Uuid::new_v4(),
            project_id,
            goals: request.goals.clone(),
            alternatives: generate_alternatives(solar_kw, battery_kwh, &self.constraints),
            targets,
            solar_size_kw: solar_kw,
            battery_size_kwh: battery_kwh,
            inverter_size_kw: inverter_kw,
            panels: equipment.panels,
            inverters: equipment.inverters,
            batteries: equipment.batteries,
            mounting: equipment.mounting,
            production_estimate_id: estimate.id,
            annual_production_kwh: estimate.annual_kwh,
            system_cost,
            annual_savings: financials.annual_savings,
            payback_years: financials.payback_years,
            npv: financials.npv,
            financials,
            backup,
            confidence,
            created_at: Utc::now(),
        };

        self.recommendations
            .save_recommendation(&recommendation)
            .await
            .map_err(SizingError::Persistence)?;

        info!(
            %project_id,
            recommendation_id = %recommendation.id,
            solar_kw,
            system_cost,
            confidence,
            "sizing recommendation stored"
        );
        Ok(recommendation)
    }

    pub async fn recommendation(&self, id: Uuid) -> Result<Option<SizingRecommendation>, SizingError> {
        self.recommendations
            .find_recommendation(id)
            .await
            .map_err(SizingError::Persistence)
    }

    /// Newest first.
    pub async fn recommendations_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SizingRecommendation>, SizingError> {
        self.recommendations
            .recommendations_for_project(project_id)
            .await
            .map_err(SizingError::Persistence)
    }

    fn acquire_load_profile(&self, request: &SizingRequest) -> Result<LoadProfile, SizingError> {
        if let Some(profile) = &request.load_profile {
            return Ok(profile.clone());
        }
        if request.bills.is_empty() {
            return Err(SizingError::MissingLoadData {
                project_id: request.project_id,
            });
        }
        Ok(self.builder.build(&request.bills)?)
    }

    async fn resolve_tariff(&self, request: &SizingRequest, load: &LoadProfile) -> Option<Tariff> {
        if let Some(tariff) = &request.tariff {
            return Some(tariff.clone());
        }
        let query = TariffQuery {
            utility_name: load.utility_name.clone(),
            rate_schedule: load.rate_schedule.clone(),
            address: request.address.clone(),
            location: Some(request.location.clone()),
        };
        match self.tariffs.find_tariff(&query).await {
            Ok(Some(tariff)) => Some(tariff),
            Ok(None) => {
                info!(project_id = %request.project_id, "no tariff found; using default rate assumptions");
                None
            }
            Err(e) => {
                warn!(error = %e, project_id = %request.project_id, "tariff lookup failed; using default rate assumptions");
                None
            }
        }
    }

    async fn catalog_items(
        &self,
        category: EquipmentCategory,
    ) -> Result<Vec<crate::domain::EquipmentCatalogItem>, SizingError> {
        self.catalog
            .items(category)
            .await
            .map_err(SizingError::Persistence)
    }

    async fn select_equipment(
        &self,
        request: &SizingRequest,
        solar_target_kw: f64,
        battery_target_kwh: Option<f64>,
    ) -> Result<SelectedEquipment, SizingError> {
        let project_id = request.project_id;
        let prefs = &request.preferences;
        let no_equipment = |e: EquipmentError| match e {
            EquipmentError::NoCandidates { category } => {
                SizingError::NoEquipment { project_id, category }
            }
            other => SizingError::Equipment(other),
        };

        let panel_items = self.catalog_items(EquipmentCategory::Panel).await?;
        let panels = self
            .selector
            .select_panels(&panel_items, solar_target_kw, prefs)
            .map_err(no_equipment)?;
        let solar_kw = panels.achieved_size;

        let batteries = match battery_target_kwh {
            Some(kwh) => {
                let items = self.catalog_items(EquipmentCategory::Battery).await?;
                Some(
                    self.selector
                        .select_battery(&items, kwh, prefs)
                        .map_err(no_equipment)?,
                )
            }
            None => None,
        };

        let inverter_target_kw = inverter_target(
            solar_kw,
            batteries.as_ref().map(|b| b.achieved_size),
            &self.constraints,
        );
        let inverter_items = self.catalog_items(EquipmentCategory::Inverter).await?;
        let inverters = self
            .selector
            .select_inverter(
                &inverter_items,
                inverter_target_kw,
                solar_kw,
                batteries.is_some(),
                prefs,
            )
            .map_err(no_equipment)?;

        let mounting_items = self.catalog_items(EquipmentCategory::Mounting).await?;
        let mounting = self.selector.select_mounting(&mounting_items, panels.unit_count);
        if mounting.is_none() {
            debug!(%project_id, "no mounting hardware in catalog");
        }

        Ok(SelectedEquipment {
            panels,
            inverters,
            batteries,
            mounting,
        })
    }

    fn backup_analysis(
        &self,
        battery_kwh: f64,
        backup: &BackupRequirements,
        requested_hours: Option<f64>,
    ) -> BackupAnalysis {
        let usable = battery_kwh * self.constraints.usable_battery_fraction;
        match backup.critical_loads.as_ref().filter(|p| p.simultaneous_kw > 0.0) {
            Some(profile) => BackupAnalysis {
                usable_capacity_kwh: usable,
                autonomy_hours: usable / profile.simultaneous_kw,
                critical_load_kw: Some(profile.simultaneous_kw),
                basis: AutonomyBasis::CriticalLoadProfile,
            },
            None => BackupAnalysis {
                usable_capacity_kwh: usable,
                autonomy_hours: requested_hours.unwrap_or(self.constraints.default_backup_hours),
                critical_load_kw: None,
                basis: AutonomyBasis::Requested,
            },
        }
    }
}

struct SelectedEquipment {
    panels: EquipmentSelection,
    inverters: EquipmentSelection,
    batteries: Option<EquipmentSelection>,
    mounting: Option<EquipmentSelection>,
}

impl SelectedEquipment {
    fn total_cost(&self) -> f64 {
        self.panels.total_cost()
            + self.inverters.total_cost()
            + self.batteries.as_ref().map_or(0.0, EquipmentSelection::total_cost)
            + self.mounting.as_ref().map_or(0.0, EquipmentSelection::total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_aggregation_formula() {
        let w = SizingConfidenceWeights {
            base: 0.0,
            ..Default::default()
        };
        // 0.3*0.5 + 0.2*0.5 + 0.1 + 0.1*(6/12)
        let score = w.aggregate(0.5, 0.5, false, 6);
        assert!((score - 0.40).abs() < 1e-9);
        let with_goals = w.aggregate(0.5, 0.5, true, 24);
        assert!((with_goals - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let w = SizingConfidenceWeights::default();
        assert_eq!(w.aggregate(1.0, 1.0, true, 12), 1.0);
        let low = SizingConfidenceWeights {
            base: -2.0,
            ..Default::default()
        };
        assert_eq!(low.aggregate(0.0, 0.0, false, 0), 0.0);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = serde_json::json!({
            "projectId": "7d9f4c1e-3f7a-4d55-9a53-2f0f2b9b8e11",
            "location": { "latitude": 34.05, "longitude": -118.24 },
            "goals": ["bill_reduction", "backup_power"]
        });
        let request: SizingRequest = serde_json::from_value(json).unwrap();
        assert!(request.bills.is_empty());
        assert_eq!(request.goals, vec![SizingGoal::BillReduction, SizingGoal::BackupPower]);
        assert_eq!(request.backup, BackupRequirements::default());
    }
}
