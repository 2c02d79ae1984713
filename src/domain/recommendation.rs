use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::EquipmentSelection;

/// Goal stated by the customer for a sizing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SizingGoal {
    NetZero,
    BillReduction,
    RoiOptimization,
    BackupPower,
}

/// Circuits that must stay powered during an outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalLoadProfile {
    /// Sum of all critical circuits
    pub total_kw: f64,
    /// Expected concurrent draw during an outage
    pub simultaneous_kw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequirements {
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub critical_loads: Option<CriticalLoadProfile>,
}

/// Abstract targets derived from goals, before equipment rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingTargets {
    pub offset_fraction: f64,
    pub solar_kw: f64,
    pub battery_kwh: Option<f64>,
    /// The target the inverter was selected against
    pub inverter_kw: f64,
    pub backup_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AutonomyBasis {
    /// Derived from usable capacity and the critical-load profile
    CriticalLoadProfile,
    /// Requested duration echoed back
    Requested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupAnalysis {
    pub usable_capacity_kwh: f64,
    pub autonomy_hours: f64,
    pub critical_load_kw: Option<f64>,
    pub basis: AutonomyBasis,
}

/// Output of the financial analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialAnalysis {
    pub system_cost: f64,
    pub tax_credit: f64,
    pub net_system_cost: f64,
    pub energy_rate: f64,
    pub tariff_applied: bool,
    pub current_annual_cost: f64,
    pub post_solar_annual_cost: f64,
    pub annual_savings: f64,
    /// `None` when the system never pays for itself
    pub payback_years: Option<f64>,
    /// (cumulative savings - net cost) / net cost over the system life
    pub roi: f64,
    pub npv: f64,
    pub lifetime_savings: f64,
    /// Fraction of the current bill removed, in [0, 1]
    pub utility_bill_reduction: f64,
}

/// Illustrative, non-costed option shown next to the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeOption {
    pub label: String,
    pub description: String,
    pub solar_size_kw: f64,
    pub battery_size_kwh: Option<f64>,
    pub tradeoff: String,
}

/// Final, immutable output of one sizing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingRecommendation {
    pub id: Uuid,
    pub project_id: Uuid,
    pub goals: Vec<SizingGoal>,
    pub targets: SizingTargets,
    pub solar_size_kw: f64,
    pub battery_size_kwh: Option<f64>,
    pub inverter_size_kw: f64,
    pub panels: EquipmentSelection,
    pub inverters: EquipmentSelection,
    pub batteries: Option<EquipmentSelection>,
    pub mounting: Option<EquipmentSelection>,
    pub production_estimate_id: Uuid,
    pub annual_production_kwh: f64,
    pub system_cost: f64,
    pub annual_savings: f64,
    pub payback_years: Option<f64>,
    pub npv: f64,
    pub financials: FinancialAnalysis,
    pub backup: Option<BackupAnalysis>,
    pub confidence: f64,
    pub alternatives: Vec<AlternativeOption>,
    pub created_at: DateTime<Utc>,
}

impl SizingRecommendation {
    pub fn dc_ac_ratio(&self) -> f64 {
        if self.inverter_size_kw > 0.0 {
            self.solar_size_kw / self.inverter_size_kw
        } else {
            0.0
        }
    }
}
