use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One utility billing period as produced by the bill-ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRecord {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_kwh: f64,
    #[serde(default)]
    pub peak_kw: Option<f64>,
    #[serde(default)]
    pub is_estimated: bool,
    #[serde(default)]
    pub utility_name: Option<String>,
    #[serde(default)]
    pub rate_schedule: Option<String>,
    #[serde(default)]
    pub on_peak_kwh: Option<f64>,
    #[serde(default)]
    pub mid_peak_kwh: Option<f64>,
    #[serde(default)]
    pub off_peak_kwh: Option<f64>,
}

impl BillRecord {
    pub fn new(period_start: NaiveDate, period_end: NaiveDate, total_kwh: f64) -> Self {
        Self {
            period_start,
            period_end,
            total_kwh,
            peak_kw: None,
            is_estimated: false,
            utility_name: None,
            rate_schedule: None,
            on_peak_kwh: None,
            mid_peak_kwh: None,
            off_peak_kwh: None,
        }
    }

    pub fn with_peak_kw(mut self, peak_kw: f64) -> Self {
        self.peak_kw = Some(peak_kw);
        self
    }

    pub fn estimated(mut self) -> Self {
        self.is_estimated = true;
        self
    }

    pub fn with_utility(mut self, utility_name: &str, rate_schedule: &str) -> Self {
        self.utility_name = Some(utility_name.to_string());
        self.rate_schedule = Some(rate_schedule.to_string());
        self
    }

    pub fn with_time_of_use(mut self, on_peak: f64, mid_peak: Option<f64>, off_peak: f64) -> Self {
        self.on_peak_kwh = Some(on_peak);
        self.mid_peak_kwh = mid_peak;
        self.off_peak_kwh = Some(off_peak);
        self
    }

    /// Number of days in the billing period, at least one.
    pub fn billing_days(&self) -> i64 {
        (self.period_end - self.period_start).num_days().max(1)
    }

    pub fn has_time_of_use(&self) -> bool {
        self.on_peak_kwh.is_some() || self.mid_peak_kwh.is_some() || self.off_peak_kwh.is_some()
    }
}
