use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::domain::{BillRecord, LoadProfile, TimeOfUseSplit, HOURS_PER_YEAR};

#[derive(Debug, Error, PartialEq)]
pub enum LoadProfileError {
    #[error("at least one bill record is required to build a load profile")]
    NoBills,
    #[error("invalid bill record #{index} ({start} to {end}): {reason}")]
    InvalidRecord {
        index: usize,
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },
}

/// Additive confidence heuristics for a load profile.
#[derive(Debug, Clone)]
pub struct LoadConfidenceWeights {
    pub base: f64,
    /// Scaled by bills available / 12
    pub coverage: f64,
    /// Bonus when usage is stable, penalty when it is highly variable
    pub variability: f64,
    pub stable_cv_below: f64,
    pub volatile_cv_above: f64,
    /// Scaled by the fraction of estimated bills
    pub estimated_penalty: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for LoadConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            coverage: 0.3,
            variability: 0.1,
            stable_cv_below: 0.3,
            volatile_cv_above: 0.7,
            estimated_penalty: 0.1,
            floor: 0.2,
            ceiling: 1.0,
        }
    }
}

/// Builds annualized load profiles from bill history.
#[derive(Debug, Clone, Default)]
pub struct LoadProfileBuilder {
    pub weights: LoadConfidenceWeights,
}

impl LoadProfileBuilder {
    pub fn new(weights: LoadConfidenceWeights) -> Self {
        Self { weights }
    }

    pub fn build(&self, bills: &[BillRecord]) -> Result<LoadProfile, LoadProfileError> {
        if bills.is_empty() {
            return Err(LoadProfileError::NoBills);
        }
        validate(bills)?;

        let total_kwh: f64 = bills.iter().map(|b| b.total_kwh).sum();
        let total_days = union_billing_days(bills);
        let average_daily_kwh = total_kwh / total_days as f64;
        let annual_kwh = average_daily_kwh * 365.0;

        let peak_kw = bills
            .iter()
            .filter_map(|b| b.peak_kw)
            .fold(0.0_f64, f64::max);

        let load_factor = if peak_kw > 0.0 {
            ((annual_kwh / HOURS_PER_YEAR) / peak_kw).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let estimated = bills.iter().filter(|b| b.is_estimated).count();
        let estimated_fraction = estimated as f64 / bills.len() as f64;

        // Most recent bill that names the utility wins.
        let latest = bills
            .iter()
            .filter(|b| b.utility_name.is_some())
            .max_by_key(|b| b.period_end);

        let confidence = self.confidence(bills, estimated_fraction);

        debug!(
            bills = bills.len(),
            total_days,
            annual_kwh,
            peak_kw,
            confidence,
            "built load profile"
        );

        Ok(LoadProfile {
            annual_kwh,
            average_daily_kwh,
            peak_kw,
            load_factor,
            time_of_use: time_of_use(bills),
            confidence,
            completeness: (total_days as f64 / 365.0).min(1.0),
            bill_count: bills.len(),
            total_billing_days: total_days,
            estimated_fraction,
            utility_name: latest.and_then(|b| b.utility_name.clone()),
            rate_schedule: latest.and_then(|b| b.rate_schedule.clone()),
            built_at: Utc::now(),
        })
    }

    fn confidence(&self, bills: &[BillRecord], estimated_fraction: f64) -> f64 {
        let w = &self.weights;
        let mut confidence = w.base;
        confidence += w.coverage * (bills.len() as f64 / 12.0).min(1.0);

        if let Some(cv) = coefficient_of_variation(bills) {
            if cv < w.stable_cv_below {
                confidence += w.variability;
            } else if cv > w.volatile_cv_above {
                confidence -= w.variability;
            }
        }

        confidence -= estimated_fraction * w.estimated_penalty;
        confidence.clamp(w.floor, w.ceiling)
    }
}

fn validate(bills: &[BillRecord]) -> Result<(), LoadProfileError> {
    for (index, bill) in bills.iter().enumerate() {
        let reason = if bill.period_end < bill.period_start {
            Some("period ends before it starts".to_string())
        } else if !bill.total_kwh.is_finite() || bill.total_kwh < 0.0 {
            Some(format!("total kWh {} is not a non-negative number", bill.total_kwh))
        } else if matches!(bill.peak_kw, Some(p) if !p.is_finite() || p < 0.0) {
            Some("peak kW must be a non-negative number".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(LoadProfileError::InvalidRecord {
                index,
                start: bill.period_start,
                end: bill.period_end,
                reason,
            });
        }
    }
    Ok(())
}

/// Days covered by the union of all billing periods; overlaps count once.
fn union_billing_days(bills: &[BillRecord]) -> i64 {
    let mut periods: Vec<(NaiveDate, NaiveDate)> = bills
        .iter()
        .map(|b| {
            let end = b.period_end.max(b.period_start + Duration::days(1));
            (b.period_start, end)
        })
        .collect();
    periods.sort();

    let mut total = 0;
    let mut current: Option<(NaiveDate, NaiveDate)> = None;
    for (start, end) in periods {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                total += (ce - cs).num_days();
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        total += (ce - cs).num_days();
    }
    total.max(1)
}

fn coefficient_of_variation(bills: &[BillRecord]) -> Option<f64> {
    let n = bills.len() as f64;
    let mean = bills.iter().map(|b| b.total_kwh).sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = bills
        .iter()
        .map(|b| (b.total_kwh - mean).powi(2))
        .sum::<f64>()
        / n;
    Some(variance.sqrt() / mean)
}

fn time_of_use(bills: &[BillRecord]) -> Option<TimeOfUseSplit> {
    if !bills.iter().any(BillRecord::has_time_of_use) {
        return None;
    }
    let scale = 12.0 / bills.len() as f64;
    let annualize = |field: fn(&BillRecord) -> Option<f64>| -> Option<f64> {
        let values: Vec<f64> = bills.iter().filter_map(field).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() * scale)
        }
    };
    Some(TimeOfUseSplit {
        on_peak_kwh: annualize(|b| b.on_peak_kwh),
        mid_peak_kwh: annualize(|b| b.mid_peak_kwh),
        off_peak_kwh: annualize(|b| b.off_peak_kwh),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Contiguous monthly bills for 2024 starting in January.
    fn monthly_bills(kwh: &[f64]) -> Vec<BillRecord> {
        kwh.iter()
            .enumerate()
            .map(|(i, k)| {
                let start = date(2024, i as u32 + 1, 1);
                let end = if i == 11 {
                    date(2025, 1, 1)
                } else {
                    date(2024, i as u32 + 2, 1)
                };
                BillRecord::new(start, end, *k)
            })
            .collect()
    }

    #[test]
    fn test_empty_bills_is_precondition_failure() {
        let err = LoadProfileBuilder::default().build(&[]).unwrap_err();
        assert_eq!(err, LoadProfileError::NoBills);
    }

    #[test]
    fn test_two_bills_annualized_by_daily_average() {
        // 31 + 29 days, 600 + 540 kWh
        let bills = monthly_bills(&[600.0, 540.0]);
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        let expected = (1140.0 / 60.0) * 365.0;
        assert!((profile.annual_kwh - expected).abs() < 1e-9);
        assert_eq!(profile.total_billing_days, 60);
    }

    #[test]
    fn test_three_bills_with_gap() {
        let bills = vec![
            BillRecord::new(date(2024, 1, 1), date(2024, 1, 31), 900.0),
            BillRecord::new(date(2024, 3, 1), date(2024, 3, 31), 600.0),
            BillRecord::new(date(2024, 5, 1), date(2024, 5, 21), 400.0),
        ];
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        let expected = (1900.0 / 80.0) * 365.0;
        assert!((profile.annual_kwh - expected).abs() < 1e-9);
    }

    #[test]
    fn test_twelve_bills_full_year() {
        let bills = monthly_bills(&[1000.0; 12]);
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        let expected = (12_000.0 / 366.0) * 365.0;
        assert!((profile.annual_kwh - expected).abs() < 1e-9);
        assert_eq!(profile.completeness, 1.0);
    }

    #[test]
    fn test_overlapping_periods_counted_once() {
        let bills = vec![
            BillRecord::new(date(2024, 1, 1), date(2024, 1, 21), 300.0),
            BillRecord::new(date(2024, 1, 11), date(2024, 1, 31), 300.0),
        ];
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        assert_eq!(profile.total_billing_days, 30);
        assert!((profile.average_daily_kwh - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_is_maximum_not_average() {
        let mut bills = monthly_bills(&[800.0, 900.0, 850.0]);
        bills[0].peak_kw = Some(4.0);
        bills[1].peak_kw = Some(9.5);
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        assert_eq!(profile.peak_kw, 9.5);
        let expected_lf = (profile.annual_kwh / 8760.0) / 9.5;
        assert!((profile.load_factor - expected_lf).abs() < 1e-12);
    }

    #[test]
    fn test_zero_peak_gives_zero_load_factor() {
        let profile = LoadProfileBuilder::default()
            .build(&monthly_bills(&[500.0]))
            .unwrap();
        assert_eq!(profile.peak_kw, 0.0);
        assert_eq!(profile.load_factor, 0.0);
    }

    #[test]
    fn test_time_of_use_scaled_and_missing_fields_omitted() {
        let mut bills = monthly_bills(&[1000.0, 1000.0, 1000.0]);
        bills[0] = bills[0].clone().with_time_of_use(300.0, None, 700.0);
        bills[1] = bills[1].clone().with_time_of_use(250.0, None, 750.0);
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        let tou = profile.time_of_use.unwrap();
        assert_eq!(tou.on_peak_kwh, Some(550.0 * 4.0));
        assert_eq!(tou.off_peak_kwh, Some(1450.0 * 4.0));
        assert_eq!(tou.mid_peak_kwh, None);
    }

    #[test]
    fn test_no_time_of_use_fields_yields_none() {
        let profile = LoadProfileBuilder::default()
            .build(&monthly_bills(&[1000.0, 1100.0]))
            .unwrap();
        assert!(profile.time_of_use.is_none());
    }

    #[test]
    fn test_twelve_consistent_bills_high_confidence() {
        let profile = LoadProfileBuilder::default()
            .build(&monthly_bills(&[
                980.0, 1010.0, 995.0, 1000.0, 1020.0, 990.0, 1005.0, 1000.0, 1015.0, 985.0,
                1000.0, 1000.0,
            ]))
            .unwrap();
        assert!(profile.confidence >= 0.9 - 1e-9);
    }

    #[test]
    fn test_single_estimated_bill_low_confidence() {
        let bills = vec![BillRecord::new(date(2024, 1, 1), date(2024, 2, 1), 900.0).estimated()];
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        assert!(profile.confidence <= 0.6);
        assert!(profile.confidence >= 0.2);
        assert_eq!(profile.estimated_fraction, 1.0);
    }

    #[rstest]
    #[case(&[100.0, 2000.0, 50.0, 3000.0], -0.1)]
    #[case(&[1000.0, 1000.0, 1000.0, 1000.0], 0.1)]
    #[case(&[1000.0, 1600.0, 500.0, 1200.0], 0.0)]
    fn test_variability_adjustment(#[case] kwh: &[f64], #[case] adjustment: f64) {
        let profile = LoadProfileBuilder::default()
            .build(&monthly_bills(kwh))
            .unwrap();
        let expected = 0.5 + 0.3 * (kwh.len() as f64 / 12.0) + adjustment;
        assert!((profile.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_period_rejected() {
        let bills = vec![BillRecord::new(date(2024, 2, 1), date(2024, 1, 1), 100.0)];
        let err = LoadProfileBuilder::default().build(&bills).unwrap_err();
        assert!(matches!(err, LoadProfileError::InvalidRecord { index: 0, .. }));
    }

    #[test]
    fn test_latest_utility_reported() {
        let mut bills = monthly_bills(&[700.0, 720.0]);
        bills[0] = bills[0].clone().with_utility("Old Power", "A-1");
        bills[1] = bills[1].clone().with_utility("SoCal Edison", "TOU-D-PRIME");
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        assert_eq!(profile.utility_name.as_deref(), Some("SoCal Edison"));
        assert_eq!(profile.rate_schedule.as_deref(), Some("TOU-D-PRIME"));
    }
}
