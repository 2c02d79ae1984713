use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{GeoLocation, SystemConfiguration};

/// How a production estimate was modeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelingMethod {
    /// External irradiance/production service
    Pvwatts,
    /// Closed-form irradiance curves derived from latitude
    Synthetic,
    /// Detailed performance model, not available yet
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceSource {
    Service,
    Synthetic,
}

/// Monthly-average irradiance and temperature.
///
/// Irradiance values are kWh/m²/day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyResource {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub temperature_c: f64,
}

/// Cached solar resource data for a location, one entry per calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarResource {
    pub id: Uuid,
    pub location: GeoLocation,
    pub monthly: Vec<MonthlyResource>,
    pub source: ResourceSource,
    pub created_at: DateTime<Utc>,
}

impl SolarResource {
    pub fn annual_ghi(&self) -> f64 {
        self.monthly.iter().map(|m| m.ghi).sum::<f64>() * super::AVERAGE_DAYS_PER_MONTH
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now - self.created_at <= window
    }
}

/// Metadata about the weather station backing a service estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the site, in the units the service reports
    pub distance: f64,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Modeled output of one array size + configuration + location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEstimate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub system_size_kw: f64,
    pub configuration: SystemConfiguration,
    pub location: GeoLocation,
    pub annual_kwh: f64,
    pub monthly_kwh: Vec<f64>,
    #[serde(default)]
    pub hourly_kwh: Vec<f64>,
    /// kWh per installed kW per year
    pub specific_yield: f64,
    pub performance_ratio: f64,
    /// Fraction in (0, 1]
    pub capacity_factor: f64,
    pub total_losses_pct: f64,
    /// Expected output for years 1 through 25
    pub degradation_profile: Vec<f64>,
    pub method: ModelingMethod,
    pub confidence: f64,
    pub station: Option<StationInfo>,
    pub warnings: Vec<String>,
    pub solar_resource_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ProductionEstimate {
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now - self.created_at <= window
    }
}
