use crate::domain::ModuleType;

pub const DEGRADATION_YEARS: usize = 25;

/// Annual output loss rates, as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationRates {
    pub first_year: f64,
    pub subsequent_years: f64,
}

impl DegradationRates {
    pub fn for_module(module_type: ModuleType) -> Self {
        match module_type {
            ModuleType::ThinFilm => Self {
                first_year: 0.008,
                subsequent_years: 0.005,
            },
            ModuleType::Standard | ModuleType::Premium => Self {
                first_year: 0.005,
                subsequent_years: 0.007,
            },
        }
    }
}

/// Expected output for each of `years` years, compounding from `annual_kwh`.
pub fn degradation_profile(annual_kwh: f64, rates: DegradationRates, years: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(years);
    let mut current = annual_kwh;
    for year in 0..years {
        let rate = if year == 0 {
            rates.first_year
        } else {
            rates.subsequent_years
        };
        current *= 1.0 - rate;
        out.push(current);
    }
    out
}
