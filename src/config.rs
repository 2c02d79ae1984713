use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub production: ProductionConfig,
    #[validate(nested)]
    pub sizing: SizingConstraints,
    #[validate(nested)]
    pub finance: FinanceAssumptions,
    #[validate(nested)]
    pub storage: StorageConfig,
}

/// External irradiance/production service and caching.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProductionConfig {
    #[validate(length(min = 1))]
    pub base_url: String,
    pub api_key: String,
    pub dataset: String,
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,
    /// Cached estimates and solar resources older than this are refetched.
    #[validate(range(min = 0, max = 365))]
    pub freshness_days: i64,
    #[validate(range(min = 0.0, max = 5.0))]
    pub location_tolerance_deg: f64,
    #[validate(range(min = 0.0))]
    pub size_tolerance_kw: f64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://developer.nrel.gov".to_string(),
            api_key: "DEMO_KEY".to_string(),
            dataset: "nsrdb".to_string(),
            timeout_seconds: 20,
            freshness_days: 7,
            location_tolerance_deg: 0.1,
            size_tolerance_kw: 0.01,
        }
    }
}

/// System-wide sizing bounds and assumptions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SizingConstraints {
    #[validate(range(min = 0.1))]
    pub min_solar_kw: f64,
    #[validate(range(min = 0.1))]
    pub max_solar_kw: f64,
    #[validate(range(min = 0.1))]
    pub min_battery_kwh: f64,
    #[validate(range(min = 0.1))]
    pub max_battery_kwh: f64,
    #[validate(range(min = 0.1))]
    pub max_inverter_kw: f64,
    /// Lower edge of the accepted array-to-inverter ratio band
    #[validate(range(min = 0.1, max = 3.0))]
    pub min_dc_ac_ratio: f64,
    /// DC:AC oversizing assumed when deriving an inverter size from the array
    #[validate(range(min = 0.5, max = 3.0))]
    pub target_dc_ac_ratio: f64,
    #[validate(range(min = 0.5, max = 3.0))]
    pub max_dc_ac_ratio: f64,
    /// kWh produced per installed kW per year
    #[validate(range(min = 100.0, max = 3000.0))]
    pub specific_yield_kwh_per_kw: f64,
    #[validate(range(min = 0.0))]
    pub installation_cost_per_watt: f64,
    #[validate(range(min = 0.5, max = 168.0))]
    pub default_backup_hours: f64,
    /// Share of peak load assumed critical when no critical-load profile is given
    #[validate(range(min = 0.0, max = 1.0))]
    pub critical_load_fraction: f64,
    #[validate(range(min = 0.1, max = 1.0))]
    pub usable_battery_fraction: f64,
    /// Maximum continuous discharge as a fraction of capacity per hour
    #[validate(range(min = 0.05, max = 4.0))]
    pub battery_c_rate: f64,
}

impl SizingConstraints {
    /// Largest array the inverter limit can serve without leaving the ratio band.
    pub fn max_array_kw(&self) -> f64 {
        self.max_solar_kw.min(self.max_inverter_kw * self.max_dc_ac_ratio)
    }
}

impl Default for SizingConstraints {
    fn default() -> Self {
        Self {
            min_solar_kw: 1.0,
            max_solar_kw: 100.0,
            min_battery_kwh: 5.0,
            max_battery_kwh: 200.0,
            max_inverter_kw: 50.0,
            min_dc_ac_ratio: 0.8,
            target_dc_ac_ratio: 1.25,
            max_dc_ac_ratio: 1.5,
            specific_yield_kwh_per_kw: 1200.0,
            installation_cost_per_watt: 1.0,
            default_backup_hours: 4.0,
            critical_load_fraction: 0.3,
            usable_battery_fraction: 0.9,
            battery_c_rate: 0.5,
        }
    }
}

/// Defaults used by the financial analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FinanceAssumptions {
    /// Applied when no tariff is available
    #[validate(range(min = 0.0))]
    pub fallback_energy_rate: f64,
    #[validate(range(min = 0.0))]
    pub fallback_monthly_fixed_charge: f64,
    /// Share of the retail rate credited for exported energy
    #[validate(range(min = 0.0, max = 1.0))]
    pub net_metering_credit_fraction: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub tax_credit_rate: f64,
    #[validate(range(min = 0.0, max = 0.5))]
    pub rate_escalation: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub discount_rate: f64,
    #[validate(range(min = 1, max = 60))]
    pub system_life_years: u32,
}

impl Default for FinanceAssumptions {
    fn default() -> Self {
        Self {
            fallback_energy_rate: 0.12,
            fallback_monthly_fixed_charge: 30.0,
            net_metering_credit_fraction: 0.9,
            tax_credit_rate: 0.30,
            rate_escalation: 0.025,
            discount_rate: 0.06,
            system_life_years: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `SIZER__`-prefixed env vars.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("SIZER__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("failed to read configuration")?;
        cfg.validate().context("invalid configuration")?;
        cfg.check_bounds()?;
        Ok(cfg)
    }

    fn check_bounds(&self) -> Result<()> {
        let s = &self.sizing;
        if s.min_solar_kw > s.max_solar_kw {
            anyhow::bail!(
                "sizing.min_solar_kw ({}) exceeds sizing.max_solar_kw ({})",
                s.min_solar_kw,
                s.max_solar_kw
            );
        }
        if s.min_battery_kwh > s.max_battery_kwh {
            anyhow::bail!(
                "sizing.min_battery_kwh ({}) exceeds sizing.max_battery_kwh ({})",
                s.min_battery_kwh,
                s.max_battery_kwh
            );
        }
        if s.min_dc_ac_ratio > s.target_dc_ac_ratio {
            anyhow::bail!(
                "sizing.min_dc_ac_ratio ({}) exceeds sizing.target_dc_ac_ratio ({})",
                s.min_dc_ac_ratio,
                s.target_dc_ac_ratio
            );
        }
        if s.target_dc_ac_ratio > s.max_dc_ac_ratio {
            anyhow::bail!(
                "sizing.target_dc_ac_ratio ({}) exceeds sizing.max_dc_ac_ratio ({})",
                s.target_dc_ac_ratio,
                s.max_dc_ac_ratio
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.check_bounds().is_ok());
        assert_eq!(cfg.sizing.max_inverter_kw, 50.0);
        assert_eq!(cfg.finance.system_life_years, 25);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [finance]
            fallback_energy_rate = 0.2

            [sizing]
            default_backup_hours = 8.0
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();
        assert_eq!(cfg.finance.fallback_energy_rate, 0.2);
        assert_eq!(cfg.sizing.default_backup_hours, 8.0);
        assert_eq!(cfg.finance.discount_rate, 0.06);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [finance]
            tax_credit_rate = 1.5
            "#,
        ));
        assert!(Config::from_figment(figment).is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [sizing]
            min_battery_kwh = 300.0
            "#,
        ));
        assert!(Config::from_figment(figment).is_err());
    }

    #[test]
    fn test_ratio_band_must_contain_target() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [sizing]
            min_dc_ac_ratio = 1.3
            "#,
        ));
        assert!(Config::from_figment(figment).is_err());
    }

    #[test]
    fn test_array_limit_follows_inverter_cap() {
        let c = SizingConstraints::default();
        assert_eq!(c.max_array_kw(), 75.0);
        let small = SizingConstraints {
            max_solar_kw: 20.0,
            ..Default::default()
        };
        assert_eq!(small.max_array_kw(), 20.0);
    }
}
