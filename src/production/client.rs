use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::losses::{array_type_code, module_type_code, total_system_losses};
use super::synthetic::{diffuse_and_direct, typical_temperature};
use super::ProductionError;
use crate::config::ProductionConfig;
use crate::domain::{
    GeoLocation, ModelingMethod, MonthlyResource, ResourceSource, SolarResource, StationInfo,
    SystemConfiguration,
};

/// Inputs handed to a production model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_size_kw: f64,
    pub configuration: SystemConfiguration,
    pub location: GeoLocation,
    /// Monthly resource already resolved for the location
    pub resource: SolarResource,
}

/// Raw modeled output, before the estimator derives ratios and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub monthly_kwh: Vec<f64>,
    pub annual_kwh: f64,
    /// Fraction, not percent
    pub capacity_factor: f64,
    pub total_losses_pct: f64,
    pub station: Option<StationInfo>,
    pub warnings: Vec<String>,
}

/// Anything that can turn an array description into modeled output.
#[async_trait]
pub trait ProductionModel: Send + Sync {
    fn method(&self) -> ModelingMethod;

    async fn estimate_production(
        &self,
        request: &ModelRequest,
    ) -> Result<ModelOutput, ProductionError>;

    /// Hourly kWh for a typical year. Advisory: failures yield an empty series.
    async fn hourly_production(&self, _request: &ModelRequest) -> Vec<f64> {
        Vec::new()
    }
}

/// Source of monthly irradiance data for a location.
#[async_trait]
pub trait SolarResourceProvider: Send + Sync {
    async fn fetch_resource(&self, location: &GeoLocation) -> Result<SolarResource, ProductionError>;
}

const MONTH_KEYS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Client for the NREL PVWatts and solar-resource endpoints.
#[derive(Clone)]
pub struct PvWattsClient {
    base_url: String,
    api_key: String,
    dataset: String,
    client: reqwest::Client,
}

impl PvWattsClient {
    pub fn new(
        base_url: String,
        api_key: String,
        dataset: String,
        timeout: Duration,
    ) -> Result<Self, ProductionError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("solar-sizer/0.1"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url,
            api_key,
            dataset,
            client,
        })
    }

    pub fn from_config(cfg: &ProductionConfig) -> Result<Self, ProductionError> {
        Self::new(
            cfg.base_url.clone(),
            cfg.api_key.clone(),
            cfg.dataset.clone(),
            Duration::from_secs(cfg.timeout_seconds),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn pvwatts_query(&self, request: &ModelRequest, timeframe: &str) -> Vec<(&'static str, String)> {
        let cfg = &request.configuration;
        vec![
            ("api_key", self.api_key.clone()),
            ("system_capacity", format!("{:.3}", request.system_size_kw)),
            ("module_type", module_type_code(cfg.module_type).to_string()),
            ("array_type", array_type_code(cfg.tracking, cfg.mounting).to_string()),
            ("losses", format!("{:.2}", total_system_losses(cfg))),
            ("tilt", format!("{:.2}", cfg.tilt_deg)),
            ("azimuth", format!("{:.2}", cfg.azimuth_deg)),
            ("lat", format!("{:.6}", request.location.latitude)),
            ("lon", format!("{:.6}", request.location.longitude)),
            ("dataset", self.dataset.clone()),
            ("timeframe", timeframe.to_string()),
        ]
    }

    async fn call_pvwatts(
        &self,
        request: &ModelRequest,
        timeframe: &str,
    ) -> Result<PvWattsResponse, ProductionError> {
        let url = self.url("/api/pvwatts/v8.json");
        debug!(%url, timeframe, size_kw = request.system_size_kw, "requesting pvwatts estimate");

        let resp = self
            .client
            .get(&url)
            .query(&self.pvwatts_query(request, timeframe))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        // The service reports validation errors in the body, often with a 4xx status.
        let parsed: Option<PvWattsResponse> = serde_json::from_str(&body).ok();
        if let Some(parsed) = parsed {
            if !parsed.errors.is_empty() {
                return Err(ProductionError::ServiceRejected {
                    latitude: request.location.latitude,
                    longitude: request.location.longitude,
                    configuration: Box::new(request.configuration.clone()),
                    errors: parsed.errors,
                });
            }
            if status.is_success() {
                return Ok(parsed);
            }
        }

        if !status.is_success() {
            return Err(ProductionError::ServiceUnavailable(format!("HTTP {status}")));
        }
        Err(ProductionError::MalformedResponse(
            "response body is not a pvwatts document".to_string(),
        ))
    }
}

#[async_trait]
impl ProductionModel for PvWattsClient {
    fn method(&self) -> ModelingMethod {
        ModelingMethod::Pvwatts
    }

    async fn estimate_production(
        &self,
        request: &ModelRequest,
    ) -> Result<ModelOutput, ProductionError> {
        let resp = self.call_pvwatts(request, "monthly").await?;
        let outputs = resp
            .outputs
            .ok_or_else(|| ProductionError::MalformedResponse("missing outputs".to_string()))?;
        if outputs.ac_monthly.len() != 12 {
            return Err(ProductionError::MalformedResponse(format!(
                "expected 12 monthly values, got {}",
                outputs.ac_monthly.len()
            )));
        }

        let annual_kwh = if outputs.ac_annual > 0.0 {
            outputs.ac_annual
        } else {
            outputs.ac_monthly.iter().sum()
        };

        info!(
            lat = request.location.latitude,
            lon = request.location.longitude,
            annual_kwh,
            warnings = resp.warnings.len(),
            "pvwatts estimate received"
        );

        Ok(ModelOutput {
            monthly_kwh: outputs.ac_monthly,
            annual_kwh,
            capacity_factor: outputs.capacity_factor / 100.0,
            total_losses_pct: total_system_losses(&request.configuration),
            station: resp.station_info.map(|s| StationInfo {
                latitude: s.lat,
                longitude: s.lon,
                distance: s.distance,
                city: s.city.filter(|c| !c.is_empty()),
                state: s.state.filter(|c| !c.is_empty()),
            }),
            warnings: resp.warnings,
        })
    }

    async fn hourly_production(&self, request: &ModelRequest) -> Vec<f64> {
        match self.call_pvwatts(request, "hourly").await {
            // Hourly AC output is reported in W.
            Ok(resp) => resp
                .outputs
                .map(|o| o.ac.into_iter().map(|w| w / 1000.0).collect())
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "hourly production unavailable");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SolarResourceProvider for PvWattsClient {
    async fn fetch_resource(&self, location: &GeoLocation) -> Result<SolarResource, ProductionError> {
        let url = self.url("/api/solar/solar_resource/v1.json");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.clone()),
                ("lat", format!("{:.6}", location.latitude)),
                ("lon", format!("{:.6}", location.longitude)),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProductionError::ServiceUnavailable(format!("HTTP {status}")));
        }
        let raw: RawResourceResponse = resp
            .json()
            .await
            .map_err(|e| ProductionError::MalformedResponse(e.to_string()))?;
        if !raw.errors.is_empty() {
            return Err(ProductionError::ServiceUnavailable(raw.errors.join("; ")));
        }

        let outputs = raw
            .outputs
            .ok_or_else(|| ProductionError::MalformedResponse("missing outputs".to_string()))?;
        let ghi = outputs.avg_ghi.and_then(RawSeries::monthly_values);
        let dni = outputs.avg_dni.and_then(RawSeries::monthly_values);
        let (ghi, dni) = match (ghi, dni) {
            (Some(g), Some(d)) => (g, d),
            _ => {
                return Err(ProductionError::MalformedResponse(
                    "no irradiance data for location".to_string(),
                ))
            }
        };

        let monthly = (0..12)
            .map(|m| {
                let (dhi, _) = diffuse_and_direct(ghi[m], location.latitude, m);
                MonthlyResource {
                    ghi: ghi[m],
                    dni: dni[m],
                    dhi,
                    temperature_c: typical_temperature(location.latitude, m),
                }
            })
            .collect();

        Ok(SolarResource {
            id: Uuid::new_v4(),
            location: location.clone(),
            monthly,
            source: ResourceSource::Service,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PvWattsResponse {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    outputs: Option<PvWattsOutputs>,
    station_info: Option<RawStation>,
}

#[derive(Debug, Deserialize)]
struct PvWattsOutputs {
    #[serde(default)]
    ac_monthly: Vec<f64>,
    #[serde(default)]
    ac_annual: f64,
    #[serde(default)]
    capacity_factor: f64,
    #[serde(default)]
    ac: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    distance: f64,
    city: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResourceResponse {
    #[serde(default)]
    errors: Vec<String>,
    outputs: Option<RawResourceOutputs>,
}

#[derive(Debug, Deserialize)]
struct RawResourceOutputs {
    #[serde(default, deserialize_with = "lenient_series")]
    avg_dni: Option<RawSeries>,
    #[serde(default, deserialize_with = "lenient_series")]
    avg_ghi: Option<RawSeries>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    monthly: HashMap<String, f64>,
}

impl RawSeries {
    fn monthly_values(self) -> Option<Vec<f64>> {
        MONTH_KEYS
            .iter()
            .map(|k| self.monthly.get(*k).copied())
            .collect()
    }
}

/// The service returns the string "no data" instead of an object for some locations.
fn lenient_series<'de, D>(deserializer: D) -> Result<Option<RawSeries>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_encodes_configuration() {
        let client = PvWattsClient::new(
            "http://localhost".into(),
            "KEY".into(),
            "nsrdb".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let request = ModelRequest {
            system_size_kw: 8.0,
            configuration: SystemConfiguration {
                soiling_loss_pct: 40.0,
                shading_loss_pct: 40.0,
                ..Default::default()
            },
            location: GeoLocation::new(34.05, -118.24),
            resource: super::super::synthetic::synthesize_resource(&GeoLocation::new(34.05, -118.24)),
        };
        let query: HashMap<_, _> = client.pvwatts_query(&request, "monthly").into_iter().collect();
        assert_eq!(query["losses"], "50.00");
        assert_eq!(query["array_type"], "1");
        assert_eq!(query["module_type"], "0");
        assert_eq!(query["timeframe"], "monthly");
    }

    #[test]
    fn test_series_requires_all_months() {
        let mut monthly = HashMap::new();
        monthly.insert("jan".to_string(), 3.0);
        assert!(RawSeries { monthly }.monthly_values().is_none());
    }
}
