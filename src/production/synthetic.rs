//! # Synthetic Production Model
//!
//! Closed-form monthly irradiance and array output, used when the external
//! service is unreachable. Irradiance follows extraterrestrial radiation on the
//! mid-month representative day scaled by a latitude-dependent clearness index;
//! plane-of-array transposition uses the isotropic sky model.

use async_trait::async_trait;
use chrono::Utc;
use std::f64::consts::PI;
use uuid::Uuid;

use super::client::{ModelOutput, ModelRequest, ProductionModel};
use super::losses::total_system_losses;
use super::ProductionError;
use crate::domain::{
    GeoLocation, ModelingMethod, ModuleType, MonthlyResource, MountingType, ResourceSource,
    SolarResource, SystemConfiguration, TrackingType, HOURS_PER_YEAR,
};

/// Solar constant in kW/m²
const SOLAR_CONSTANT: f64 = 1.367;
/// Representative day of year for each month
const MID_MONTH_DAYS: [f64; 12] = [
    17.0, 47.0, 75.0, 105.0, 135.0, 162.0, 198.0, 228.0, 258.0, 288.0, 318.0, 344.0,
];
const DAYS_IN_MONTH: [f64; 12] = [
    31.0, 28.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];
const GROUND_ALBEDO: f64 = 0.2;
const INVERTER_EFFICIENCY: f64 = 0.96;
const STC_CELL_TEMP_C: f64 = 25.0;

/// Solar declination in radians for day-of-year `n`.
fn declination(n: f64) -> f64 {
    (23.45_f64).to_radians() * (2.0 * PI * (284.0 + n) / 365.0).sin()
}

/// Sunset hour angle in radians.
fn sunset_hour_angle(lat_rad: f64, decl: f64) -> f64 {
    (-lat_rad.tan() * decl.tan()).clamp(-1.0, 1.0).acos()
}

/// Daily extraterrestrial radiation on a horizontal surface, kWh/m²/day.
fn extraterrestrial_daily(latitude: f64, month: usize) -> f64 {
    let n = MID_MONTH_DAYS[month % 12];
    let lat = latitude.to_radians();
    let decl = declination(n);
    let ws = sunset_hour_angle(lat, decl);
    let eccentricity = 1.0 + 0.033 * (2.0 * PI * n / 365.0).cos();
    let h0 = (24.0 / PI)
        * SOLAR_CONSTANT
        * eccentricity
        * (lat.cos() * decl.cos() * ws.sin() + ws * lat.sin() * decl.sin());
    h0.max(0.0)
}

/// Monthly clearness index assumed for a latitude.
fn clearness_index(latitude: f64) -> f64 {
    (0.62 - 0.25 * latitude.abs() / 90.0).clamp(0.35, 0.65)
}

/// Erbs diffuse fraction for clearness index `kt`.
fn diffuse_fraction(kt: f64) -> f64 {
    let kd = 1.391 - 3.560 * kt + 4.189 * kt.powi(2) - 2.137 * kt.powi(3);
    kd.clamp(0.1, 1.0)
}

/// Split daily GHI into (diffuse, beam-on-horizontal), both kWh/m²/day.
pub fn diffuse_and_direct(ghi: f64, latitude: f64, month: usize) -> (f64, f64) {
    let h0 = extraterrestrial_daily(latitude, month);
    let kt = if h0 > 0.0 {
        (ghi / h0).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let dhi = ghi * diffuse_fraction(kt);
    (dhi, (ghi - dhi).max(0.0))
}

/// Average ambient temperature for a latitude and month index (0 = January).
pub fn typical_temperature(latitude: f64, month: usize) -> f64 {
    let mean = 28.0 - 0.3 * latitude.abs();
    let amplitude = 0.25 * latitude.abs();
    let warmest = if latitude >= 0.0 { 6.0 } else { 0.0 };
    mean + amplitude * (2.0 * PI * ((month % 12) as f64 - warmest) / 12.0).cos()
}

/// Mean cosine of the zenith angle over daylight hours.
fn mean_daylight_cos_zenith(latitude: f64, month: usize) -> f64 {
    let lat = latitude.to_radians();
    let decl = declination(MID_MONTH_DAYS[month % 12]);
    let ws = sunset_hour_angle(lat, decl);
    if ws <= 0.0 {
        return 0.0;
    }
    ((lat.cos() * decl.cos() * ws.sin() + ws * lat.sin() * decl.sin()) / ws).max(0.0)
}

/// Build a twelve-month resource from latitude alone.
pub fn synthesize_resource(location: &GeoLocation) -> SolarResource {
    let monthly = (0..12)
        .map(|m| {
            let ghi = clearness_index(location.latitude)
                * extraterrestrial_daily(location.latitude, m);
            let (dhi, beam) = diffuse_and_direct(ghi, location.latitude, m);
            let cos_z = mean_daylight_cos_zenith(location.latitude, m);
            let dni = if cos_z > 0.05 { beam / cos_z } else { 0.0 };
            MonthlyResource {
                ghi,
                dni,
                dhi,
                temperature_c: typical_temperature(location.latitude, m),
            }
        })
        .collect();

    SolarResource {
        id: Uuid::new_v4(),
        location: location.clone(),
        monthly,
        source: ResourceSource::Synthetic,
        created_at: Utc::now(),
    }
}

/// Ratio of beam on the tilted plane to beam on the horizontal (Liu-Jordan),
/// for an equator-facing surface. Southern sites are mirrored.
fn beam_tilt_factor(latitude: f64, tilt_deg: f64, month: usize) -> f64 {
    let mut decl = declination(MID_MONTH_DAYS[month % 12]);
    if latitude < 0.0 {
        decl = -decl;
    }
    let lat = latitude.abs().to_radians();
    let tilt = tilt_deg.to_radians();
    let ws = sunset_hour_angle(lat, decl);
    let ws_tilted = ws.min(sunset_hour_angle(lat - tilt, decl));

    let horizontal = lat.cos() * decl.cos() * ws.sin() + ws * lat.sin() * decl.sin();
    if horizontal <= 1e-6 {
        return 0.0;
    }
    let tilted = (lat - tilt).cos() * decl.cos() * ws_tilted.sin()
        + ws_tilted * (lat - tilt).sin() * decl.sin();
    (tilted / horizontal).max(0.0)
}

/// Penalty for facing away from the equator.
fn azimuth_factor(latitude: f64, azimuth_deg: f64) -> f64 {
    let equator_facing = if latitude >= 0.0 { 180.0 } else { 0.0 };
    let dev = (azimuth_deg - equator_facing).rem_euclid(360.0);
    let dev = dev.min(360.0 - dev).to_radians();
    (1.0 - 0.3 * (1.0 - dev.cos())).max(0.4)
}

fn tracking_gain(tracking: TrackingType) -> f64 {
    match tracking {
        TrackingType::Fixed => 1.0,
        TrackingType::SingleAxis => 1.25,
        TrackingType::DualAxis => 1.35,
    }
}

fn temperature_coefficient(module_type: ModuleType) -> f64 {
    match module_type {
        ModuleType::Standard => -0.0037,
        ModuleType::Premium => -0.0035,
        ModuleType::ThinFilm => -0.0020,
    }
}

fn cell_temperature_rise(mounting: MountingType) -> f64 {
    match mounting {
        MountingType::RoofMount => 25.0,
        MountingType::GroundMount => 20.0,
    }
}

/// Plane-of-array daily irradiance for one month, kWh/m²/day.
pub fn plane_of_array(
    month: &MonthlyResource,
    latitude: f64,
    cfg: &SystemConfiguration,
    index: usize,
) -> f64 {
    let beam = (month.ghi - month.dhi).max(0.0);
    let tilt = cfg.tilt_deg.to_radians();
    let beam_poa = beam
        * beam_tilt_factor(latitude, cfg.tilt_deg, index)
        * azimuth_factor(latitude, cfg.azimuth_deg);
    let diffuse_poa = month.dhi * (1.0 + tilt.cos()) / 2.0;
    let reflected = month.ghi * GROUND_ALBEDO * (1.0 - tilt.cos()) / 2.0;
    (beam_poa + diffuse_poa + reflected) * tracking_gain(cfg.tracking)
}

/// Production model evaluated entirely in-process.
#[derive(Debug, Clone, Default)]
pub struct SyntheticProductionModel;

impl SyntheticProductionModel {
    pub fn new() -> Self {
        Self
    }

    fn monthly_output(&self, request: &ModelRequest) -> Vec<f64> {
        let cfg = &request.configuration;
        let loss_factor = 1.0 - total_system_losses(cfg) / 100.0;
        let coef = temperature_coefficient(cfg.module_type);
        let rise = cell_temperature_rise(cfg.mounting);

        request
            .resource
            .monthly
            .iter()
            .enumerate()
            .take(12)
            .map(|(i, month)| {
                let poa = plane_of_array(month, request.location.latitude, cfg, i);
                let cell_temp = month.temperature_c + rise;
                let temp_factor = (1.0 + coef * (cell_temp - STC_CELL_TEMP_C)).max(0.0);
                request.system_size_kw
                    * poa
                    * DAYS_IN_MONTH[i]
                    * temp_factor
                    * loss_factor
                    * INVERTER_EFFICIENCY
            })
            .collect()
    }
}

#[async_trait]
impl ProductionModel for SyntheticProductionModel {
    fn method(&self) -> ModelingMethod {
        ModelingMethod::Synthetic
    }

    async fn estimate_production(
        &self,
        request: &ModelRequest,
    ) -> Result<ModelOutput, ProductionError> {
        if request.resource.monthly.len() != 12 {
            return Err(ProductionError::MalformedResponse(format!(
                "solar resource has {} months",
                request.resource.monthly.len()
            )));
        }
        let monthly_kwh = self.monthly_output(request);
        let annual_kwh: f64 = monthly_kwh.iter().sum();
        let capacity_factor = if request.system_size_kw > 0.0 {
            annual_kwh / (request.system_size_kw * HOURS_PER_YEAR)
        } else {
            0.0
        };

        Ok(ModelOutput {
            monthly_kwh,
            annual_kwh,
            capacity_factor,
            total_losses_pct: total_system_losses(&request.configuration),
            station: None,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(lat: f64, cfg: SystemConfiguration) -> ModelRequest {
        let location = GeoLocation::new(lat, -100.0);
        ModelRequest {
            system_size_kw: 10.0,
            configuration: cfg,
            resource: synthesize_resource(&location),
            location,
        }
    }

    #[test]
    fn test_resource_has_twelve_plausible_months() {
        let resource = synthesize_resource(&GeoLocation::new(34.05, -118.24));
        assert_eq!(resource.monthly.len(), 12);
        assert_eq!(resource.source, ResourceSource::Synthetic);
        for m in &resource.monthly {
            assert!(m.ghi > 1.0 && m.ghi < 9.0, "ghi {}", m.ghi);
            assert!(m.dhi < m.ghi);
        }
        // Northern summer beats northern winter
        assert!(resource.monthly[5].ghi > resource.monthly[11].ghi);
    }

    #[test]
    fn test_southern_hemisphere_seasons_flip() {
        let resource = synthesize_resource(&GeoLocation::new(-33.9, 151.2));
        assert!(resource.monthly[0].ghi > resource.monthly[6].ghi);
        assert!(resource.monthly[0].temperature_c > resource.monthly[6].temperature_c);
    }

    #[tokio::test]
    async fn test_specific_yield_is_realistic() {
        let cfg = SystemConfiguration::for_latitude(34.05);
        let out = SyntheticProductionModel::new()
            .estimate_production(&request(34.05, cfg))
            .await
            .unwrap();
        let specific_yield = out.annual_kwh / 10.0;
        assert!(
            (900.0..2000.0).contains(&specific_yield),
            "specific yield {specific_yield}"
        );
        assert!(out.capacity_factor > 0.0 && out.capacity_factor <= 1.0);
        assert_eq!(out.monthly_kwh.len(), 12);
    }

    #[rstest]
    #[case(TrackingType::SingleAxis)]
    #[case(TrackingType::DualAxis)]
    #[tokio::test]
    async fn test_tracking_increases_output(#[case] tracking: TrackingType) {
        let model = SyntheticProductionModel::new();
        let fixed = model
            .estimate_production(&request(40.0, SystemConfiguration::for_latitude(40.0)))
            .await
            .unwrap();
        let tracked = model
            .estimate_production(&request(
                40.0,
                SystemConfiguration {
                    tracking,
                    ..SystemConfiguration::for_latitude(40.0)
                },
            ))
            .await
            .unwrap();
        assert!(tracked.annual_kwh > fixed.annual_kwh);
    }

    #[test]
    fn test_north_facing_array_is_penalized() {
        assert_eq!(azimuth_factor(40.0, 180.0), 1.0);
        assert!((azimuth_factor(40.0, 0.0) - 0.4).abs() < 1e-9);
        assert_eq!(azimuth_factor(-40.0, 0.0), 1.0);
    }

    #[test]
    fn test_diffuse_fraction_bounds() {
        assert!(diffuse_fraction(0.0) <= 1.0);
        assert!(diffuse_fraction(0.8) >= 0.1);
    }
}
