use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{ModelOutput, ModelRequest, ProductionModel, PvWattsClient, SolarResourceProvider};
use super::degradation::{degradation_profile, DegradationRates, DEGRADATION_YEARS};
use super::synthetic::{synthesize_resource, SyntheticProductionModel};
use super::ProductionError;
use crate::config::ProductionConfig;
use crate::domain::{
    GeoLocation, ModelingMethod, ProductionEstimate, ResourceSource, SolarResource,
    SystemConfiguration,
};
use crate::repo::{EstimateCache, Repositories, SolarResourceStore};

/// Cache windows and service limits for the estimator.
#[derive(Debug, Clone)]
pub struct EstimatorSettings {
    pub freshness: chrono::Duration,
    pub service_timeout: Duration,
    pub location_tolerance_deg: f64,
    pub size_tolerance_kw: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self::from(&ProductionConfig::default())
    }
}

impl From<&ProductionConfig> for EstimatorSettings {
    fn from(cfg: &ProductionConfig) -> Self {
        Self {
            freshness: chrono::Duration::days(cfg.freshness_days),
            service_timeout: Duration::from_secs(cfg.timeout_seconds),
            location_tolerance_deg: cfg.location_tolerance_deg,
            size_tolerance_kw: cfg.size_tolerance_kw,
        }
    }
}

/// Additive confidence heuristics for production estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionConfidenceWeights {
    pub service_base: f64,
    pub service_floor: f64,
    pub synthetic_base: f64,
    pub synthetic_floor: f64,
    pub warnings_penalty: f64,
    /// In the distance units the service reports
    pub station_distance_limit: f64,
    pub station_distance_penalty: f64,
    pub tilt_range_deg: (f64, f64),
    pub tilt_penalty: f64,
    pub shading_limit_pct: f64,
    pub shading_penalty: f64,
}

impl Default for ProductionConfidenceWeights {
    fn default() -> Self {
        Self {
            service_base: 0.85,
            service_floor: 0.50,
            synthetic_base: 0.60,
            synthetic_floor: 0.30,
            warnings_penalty: 0.10,
            station_distance_limit: 50.0,
            station_distance_penalty: 0.05,
            tilt_range_deg: (5.0, 60.0),
            tilt_penalty: 0.05,
            shading_limit_pct: 10.0,
            shading_penalty: 0.10,
        }
    }
}

impl ProductionConfidenceWeights {
    pub fn score(
        &self,
        method: ModelingMethod,
        output: &ModelOutput,
        cfg: &SystemConfiguration,
    ) -> f64 {
        let (base, floor) = match method {
            ModelingMethod::Pvwatts => (self.service_base, self.service_floor),
            ModelingMethod::Synthetic | ModelingMethod::Detailed => {
                (self.synthetic_base, self.synthetic_floor)
            }
        };

        let mut confidence = base;
        if !output.warnings.is_empty() {
            confidence -= self.warnings_penalty;
        }
        if output
            .station
            .as_ref()
            .is_some_and(|s| s.distance > self.station_distance_limit)
        {
            confidence -= self.station_distance_penalty;
        }
        let (min_tilt, max_tilt) = self.tilt_range_deg;
        if cfg.tilt_deg < min_tilt || cfg.tilt_deg > max_tilt {
            confidence -= self.tilt_penalty;
        }
        if cfg.shading_loss_pct > self.shading_limit_pct {
            confidence -= self.shading_penalty;
        }
        confidence.max(floor)
    }
}

/// One production estimate request.
#[derive(Debug, Clone)]
pub struct ProductionRequest {
    pub project_id: Uuid,
    pub system_size_kw: f64,
    pub configuration: SystemConfiguration,
    pub location: GeoLocation,
    /// `None` selects the external service with synthetic fallback
    pub method: Option<ModelingMethod>,
    /// Fail instead of falling back when `method` cannot be honored
    pub strict_method: bool,
    pub include_hourly: bool,
}

impl ProductionRequest {
    pub fn new(
        project_id: Uuid,
        system_size_kw: f64,
        configuration: SystemConfiguration,
        location: GeoLocation,
    ) -> Self {
        Self {
            project_id,
            system_size_kw,
            configuration,
            location,
            method: None,
            strict_method: false,
            include_hourly: false,
        }
    }

    pub fn with_method(mut self, method: ModelingMethod, strict: bool) -> Self {
        self.method = Some(method);
        self.strict_method = strict;
        self
    }

    pub fn with_hourly(mut self) -> Self {
        self.include_hourly = true;
        self
    }
}

/// Produces [`ProductionEstimate`]s from the external service, falling back
/// to the synthetic model when the service cannot answer.
pub struct ProductionEstimator {
    service: Arc<dyn ProductionModel>,
    fallback: Arc<dyn ProductionModel>,
    resources: Arc<dyn SolarResourceProvider>,
    estimate_cache: Arc<dyn EstimateCache>,
    resource_store: Arc<dyn SolarResourceStore>,
    settings: EstimatorSettings,
    weights: ProductionConfidenceWeights,
}

impl ProductionEstimator {
    pub fn new(
        service: Arc<dyn ProductionModel>,
        resources: Arc<dyn SolarResourceProvider>,
        estimate_cache: Arc<dyn EstimateCache>,
        resource_store: Arc<dyn SolarResourceStore>,
        settings: EstimatorSettings,
    ) -> Self {
        Self {
            service,
            fallback: Arc::new(SyntheticProductionModel::new()),
            resources,
            estimate_cache,
            resource_store,
            settings,
            weights: ProductionConfidenceWeights::default(),
        }
    }

    /// PVWatts-backed estimator wired to the given stores.
    pub fn from_config(
        cfg: &ProductionConfig,
        repos: &Repositories,
    ) -> Result<Self, ProductionError> {
        let client = Arc::new(PvWattsClient::from_config(cfg)?);
        Ok(Self::new(
            client.clone(),
            client,
            repos.estimates.clone(),
            repos.resources.clone(),
            EstimatorSettings::from(cfg),
        ))
    }

    pub fn with_weights(mut self, weights: ProductionConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub async fn estimate(
        &self,
        request: &ProductionRequest,
    ) -> Result<ProductionEstimate, ProductionError> {
        if !request.location.is_valid() {
            return Err(ProductionError::InvalidCoordinates {
                latitude: request.location.latitude,
                longitude: request.location.longitude,
            });
        }
        if !request.system_size_kw.is_finite() || request.system_size_kw <= 0.0 {
            return Err(ProductionError::InvalidSystemSize(request.system_size_kw));
        }

        let method = self.resolve_method(request)?;

        if let Some(cached) = self.cached_estimate(request, method).await {
            info!(
                project_id = %request.project_id,
                estimate_id = %cached.id,
                "reusing cached production estimate"
            );
            return Ok(cached);
        }

        let resource = self.resolve_resource(&request.location, method).await;
        let model_request = ModelRequest {
            system_size_kw: request.system_size_kw,
            configuration: request.configuration.clone(),
            location: request.location.clone(),
            resource,
        };

        let (used_method, output, model) = match method {
            ModelingMethod::Pvwatts => self.run_service(&model_request).await?,
            _ => {
                let out = self.fallback.estimate_production(&model_request).await?;
                (self.fallback.method(), out, self.fallback.clone())
            }
        };
        let hourly_kwh = if request.include_hourly {
            match tokio::time::timeout(
                self.settings.service_timeout,
                model.hourly_production(&model_request),
            )
            .await
            {
                Ok(series) => series,
                Err(_) => {
                    warn!(project_id = %request.project_id, "hourly production timed out");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut estimate =
            self.assemble(request, &model_request, used_method, output, hourly_kwh)?;
        if used_method != method {
            estimate
                .warnings
                .push("production service unavailable; synthetic model used".to_string());
        }

        if let Err(e) = self.estimate_cache.store_estimate(&estimate).await {
            warn!(error = %e, project_id = %request.project_id, "failed to cache production estimate");
        }
        Ok(estimate)
    }

    fn resolve_method(&self, request: &ProductionRequest) -> Result<ModelingMethod, ProductionError> {
        match request.method {
            None | Some(ModelingMethod::Pvwatts) => Ok(ModelingMethod::Pvwatts),
            Some(ModelingMethod::Synthetic) => Ok(ModelingMethod::Synthetic),
            Some(ModelingMethod::Detailed) if request.strict_method => {
                Err(ProductionError::MethodNotImplemented(ModelingMethod::Detailed))
            }
            Some(ModelingMethod::Detailed) => {
                warn!(
                    project_id = %request.project_id,
                    "detailed modeling is not implemented; using default method"
                );
                Ok(ModelingMethod::Pvwatts)
            }
        }
    }

    async fn cached_estimate(
        &self,
        request: &ProductionRequest,
        method: ModelingMethod,
    ) -> Option<ProductionEstimate> {
        let since = Utc::now() - self.settings.freshness;
        let recent = match self
            .estimate_cache
            .recent_estimates(request.project_id, since)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                warn!(error = %e, project_id = %request.project_id, "estimate cache lookup failed");
                return None;
            }
        };

        recent.into_iter().find(|e| {
            (e.system_size_kw - request.system_size_kw).abs() <= self.settings.size_tolerance_kw
                && e.configuration.is_similar_to(&request.configuration)
                && e.location
                    .is_near(&request.location, self.settings.location_tolerance_deg)
                && (request.method.is_none() || e.method == method)
                && (!request.include_hourly || !e.hourly_kwh.is_empty())
        })
    }

    /// Fresh stored resource, else the provider, else synthesized from latitude.
    async fn resolve_resource(&self, location: &GeoLocation, method: ModelingMethod) -> SolarResource {
        match self
            .resource_store
            .find_near(location, self.settings.location_tolerance_deg)
            .await
        {
            Ok(Some(resource)) if resource.is_fresh(Utc::now(), self.settings.freshness) => {
                debug!(resource_id = %resource.id, "using cached solar resource");
                return resource;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "solar resource lookup failed"),
        }

        if method == ModelingMethod::Synthetic {
            return synthesize_resource(location);
        }

        let fetched = tokio::time::timeout(
            self.settings.service_timeout,
            self.resources.fetch_resource(location),
        )
        .await
        .unwrap_or(Err(ProductionError::Timeout(self.settings.service_timeout)));

        match fetched {
            Ok(resource) => {
                if resource.source == ResourceSource::Service {
                    if let Err(e) = self.resource_store.store_resource(&resource).await {
                        warn!(error = %e, "failed to cache solar resource");
                    }
                }
                resource
            }
            Err(e) => {
                warn!(
                    error = %e,
                    lat = location.latitude,
                    lon = location.longitude,
                    "solar resource unavailable; synthesizing from latitude"
                );
                synthesize_resource(location)
            }
        }
    }

    async fn run_service(
        &self,
        request: &ModelRequest,
    ) -> Result<(ModelingMethod, ModelOutput, Arc<dyn ProductionModel>), ProductionError> {
        let result = tokio::time::timeout(
            self.settings.service_timeout,
            self.service.estimate_production(request),
        )
        .await
        .unwrap_or(Err(ProductionError::Timeout(self.settings.service_timeout)));

        match result {
            Ok(out) => Ok((self.service.method(), out, self.service.clone())),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "production service failed; falling back to synthetic model");
                let out = self.fallback.estimate_production(request).await?;
                Ok((self.fallback.method(), out, self.fallback.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn assemble(
        &self,
        request: &ProductionRequest,
        model_request: &ModelRequest,
        method: ModelingMethod,
        output: ModelOutput,
        hourly_kwh: Vec<f64>,
    ) -> Result<ProductionEstimate, ProductionError> {
        let cf = output.capacity_factor;
        if !(cf > 0.0 && cf <= 1.0) {
            return Err(ProductionError::InvalidCapacityFactor(cf));
        }

        let size = request.system_size_kw;
        let theoretical_kwh = model_request.resource.annual_ghi() * size;
        let performance_ratio = if theoretical_kwh > 0.0 {
            output.annual_kwh / theoretical_kwh
        } else {
            0.0
        };

        let confidence = self.weights.score(method, &output, &request.configuration);
        let rates = DegradationRates::for_module(request.configuration.module_type);

        Ok(ProductionEstimate {
            id: Uuid::new_v4(),
            project_id: request.project_id,
            system_size_kw: size,
            configuration: request.configuration.clone(),
            location: request.location.clone(),
            annual_kwh: output.annual_kwh,
            monthly_kwh: output.monthly_kwh,
            hourly_kwh,
            specific_yield: output.annual_kwh / size,
            performance_ratio,
            capacity_factor: cf,
            total_losses_pct: output.total_losses_pct,
            degradation_profile: degradation_profile(output.annual_kwh, rates, DEGRADATION_YEARS),
            method,
            confidence,
            station: output.station,
            warnings: output.warnings,
            solar_resource_id: model_request.resource.id,
            created_at: Utc::now(),
        })
    }
}
