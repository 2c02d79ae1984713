use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annualized time-of-use totals. Periods never reported on any bill stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfUseSplit {
    pub on_peak_kwh: Option<f64>,
    pub mid_peak_kwh: Option<f64>,
    pub off_peak_kwh: Option<f64>,
}

/// Annualized consumption behavior for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfile {
    pub annual_kwh: f64,
    pub average_daily_kwh: f64,
    pub peak_kw: f64,
    /// Average kW over peak kW, in [0, 1].
    pub load_factor: f64,
    pub time_of_use: Option<TimeOfUseSplit>,
    /// Always within [0.2, 1.0].
    pub confidence: f64,
    /// Billing days covered divided by 365, capped at 1.
    pub completeness: f64,
    pub bill_count: usize,
    pub total_billing_days: i64,
    pub estimated_fraction: f64,
    pub utility_name: Option<String>,
    pub rate_schedule: Option<String>,
    pub built_at: DateTime<Utc>,
}
