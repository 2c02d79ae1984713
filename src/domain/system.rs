use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Geographic location of a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// True when both coordinates lie within `tolerance_deg` of `other`.
    pub fn is_near(&self, other: &GeoLocation, tolerance_deg: f64) -> bool {
        (self.latitude - other.latitude).abs() <= tolerance_deg
            && (self.longitude - other.longitude).abs() <= tolerance_deg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingType {
    Fixed,
    SingleAxis,
    DualAxis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleType {
    Standard,
    Premium,
    ThinFilm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MountingType {
    RoofMount,
    GroundMount,
}

/// Physical array parameters for one sizing attempt.
///
/// Loss fields are percentages (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfiguration {
    pub tilt_deg: f64,
    /// 180 = south-facing
    pub azimuth_deg: f64,
    pub tracking: TrackingType,
    pub module_type: ModuleType,
    pub mounting: MountingType,
    pub soiling_loss_pct: f64,
    pub shading_loss_pct: f64,
    /// Wiring, mismatch and connection losses combined
    pub dc_loss_pct: f64,
    /// Availability losses
    pub ac_loss_pct: f64,
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self {
            tilt_deg: 20.0,
            azimuth_deg: 180.0,
            tracking: TrackingType::Fixed,
            module_type: ModuleType::Standard,
            mounting: MountingType::RoofMount,
            soiling_loss_pct: 2.0,
            shading_loss_pct: 3.0,
            dc_loss_pct: 4.5,
            ac_loss_pct: 3.0,
        }
    }
}

impl SystemConfiguration {
    /// Default roof-mounted configuration with the tilt derived from latitude.
    pub fn for_latitude(latitude: f64) -> Self {
        Self {
            tilt_deg: tilt_for_latitude(latitude),
            ..Self::default()
        }
    }

    /// Whether a cached estimate computed for `other` can stand in for `self`.
    pub fn is_similar_to(&self, other: &SystemConfiguration) -> bool {
        self.tracking == other.tracking
            && self.mounting == other.mounting
            && self.module_type == other.module_type
            && (self.tilt_deg - other.tilt_deg).abs() <= 5.0
            && angular_distance(self.azimuth_deg, other.azimuth_deg) <= 10.0
            && (self.shading_loss_pct - other.shading_loss_pct).abs() <= 2.0
    }
}

/// |latitude| - 15, clamped to [5, 60] degrees.
pub fn tilt_for_latitude(latitude: f64) -> f64 {
    (latitude.abs() - 15.0).clamp(5.0, 60.0)
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilt_for_latitude_is_clamped() {
        assert_eq!(tilt_for_latitude(34.05), 34.05 - 15.0);
        assert_eq!(tilt_for_latitude(10.0), 5.0);
        assert_eq!(tilt_for_latitude(-89.0), 60.0);
    }

    #[test]
    fn test_similarity_tolerances() {
        let base = SystemConfiguration::default();
        let close = SystemConfiguration {
            tilt_deg: base.tilt_deg + 4.9,
            azimuth_deg: 189.0,
            shading_loss_pct: base.shading_loss_pct + 1.5,
            ..base.clone()
        };
        assert!(base.is_similar_to(&close));

        let tilted = SystemConfiguration {
            tilt_deg: base.tilt_deg + 6.0,
            ..base.clone()
        };
        assert!(!base.is_similar_to(&tilted));

        let thin = SystemConfiguration {
            module_type: ModuleType::ThinFilm,
            ..base.clone()
        };
        assert!(!base.is_similar_to(&thin));
    }

    #[test]
    fn test_azimuth_wraps_around_north() {
        let a = SystemConfiguration {
            azimuth_deg: 355.0,
            ..Default::default()
        };
        let b = SystemConfiguration {
            azimuth_deg: 3.0,
            ..Default::default()
        };
        assert!(a.is_similar_to(&b));
    }

    #[test]
    fn test_geo_location_validity() {
        assert!(GeoLocation::new(34.05, -118.24).is_valid());
        assert!(!GeoLocation::new(91.0, 0.0).is_valid());
        assert!(!GeoLocation::new(f64::NAN, 0.0).is_valid());
    }
}
