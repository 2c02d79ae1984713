use thiserror::Error;

use crate::config::FinanceAssumptions;
use crate::domain::{FinancialAnalysis, LoadProfile, Tariff};

#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    #[error("invalid system cost: {0}")]
    InvalidSystemCost(f64),

    #[error("invalid annual production: {0} kWh")]
    InvalidProduction(f64),

    #[error("invalid annual load: {0} kWh")]
    InvalidLoad(f64),
}

/// Years to recover `net_cost` from flat `annual_savings`.
pub fn payback_years(net_cost: f64, annual_savings: f64) -> Option<f64> {
    (annual_savings > 0.0).then(|| net_cost / annual_savings)
}

/// Sum of `annual_savings` escalating each year, over `years` years.
pub fn cumulative_savings(annual_savings: f64, escalation: f64, years: u32) -> f64 {
    (0..years)
        .map(|t| annual_savings * (1.0 + escalation).powi(t as i32))
        .sum()
}

/// Escalating savings discounted at `discount_rate`, net of `net_cost`.
///
/// Year `t` (1-based) contributes `S * (1 + e)^(t-1) / (1 + d)^t`.
pub fn net_present_value(
    net_cost: f64,
    annual_savings: f64,
    discount_rate: f64,
    escalation: f64,
    years: u32,
) -> f64 {
    let pv: f64 = (1..=years)
        .map(|t| {
            annual_savings * (1.0 + escalation).powi(t as i32 - 1)
                / (1.0 + discount_rate).powi(t as i32)
        })
        .sum();
    pv - net_cost
}

/// (cumulative - net) / net; zero when nothing was spent.
pub fn return_on_investment(net_cost: f64, cumulative: f64) -> f64 {
    if net_cost > 0.0 {
        (cumulative - net_cost) / net_cost
    } else {
        0.0
    }
}

/// Savings, payback and NPV for a system under a tariff.
///
/// Performs no I/O; identical inputs give identical output.
#[derive(Debug, Clone, Default)]
pub struct FinancialAnalyzer {
    assumptions: FinanceAssumptions,
}

impl FinancialAnalyzer {
    pub fn new(assumptions: FinanceAssumptions) -> Self {
        Self { assumptions }
    }

    pub fn analyze(
        &self,
        system_cost: f64,
        annual_production_kwh: f64,
        load: &LoadProfile,
        tariff: Option<&Tariff>,
    ) -> Result<FinancialAnalysis, FinanceError> {
        if !system_cost.is_finite() || system_cost < 0.0 {
            return Err(FinanceError::InvalidSystemCost(system_cost));
        }
        if !annual_production_kwh.is_finite() || annual_production_kwh < 0.0 {
            return Err(FinanceError::InvalidProduction(annual_production_kwh));
        }
        if !load.annual_kwh.is_finite() || load.annual_kwh < 0.0 {
            return Err(FinanceError::InvalidLoad(load.annual_kwh));
        }

        let a = &self.assumptions;
        let energy_rate = tariff
            .and_then(Tariff::energy_rate)
            .unwrap_or(a.fallback_energy_rate);
        let monthly_fixed = tariff
            .map(Tariff::monthly_fixed_charges)
            .unwrap_or(a.fallback_monthly_fixed_charge);
        let annual_fixed = monthly_fixed * 12.0;

        let current_annual_cost = load.annual_kwh * energy_rate + annual_fixed;

        let net_usage = (load.annual_kwh - annual_production_kwh).max(0.0);
        let exported = (annual_production_kwh - load.annual_kwh).max(0.0);
        // Export credit offsets fixed charges too; the bill itself never goes below zero.
        let energy_charge = net_usage * energy_rate
            - exported * energy_rate * a.net_metering_credit_fraction;
        let post_solar_annual_cost = (annual_fixed + energy_charge).max(0.0);

        let annual_savings = current_annual_cost - post_solar_annual_cost;
        let tax_credit = system_cost * a.tax_credit_rate;
        let net_system_cost = system_cost - tax_credit;

        let lifetime_savings =
            cumulative_savings(annual_savings, a.rate_escalation, a.system_life_years);
        let npv = net_present_value(
            net_system_cost,
            annual_savings,
            a.discount_rate,
            a.rate_escalation,
            a.system_life_years,
        );

        let utility_bill_reduction = if current_annual_cost > 0.0 {
            (annual_savings / current_annual_cost).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(FinancialAnalysis {
            system_cost,
            tax_credit,
            net_system_cost,
            energy_rate,
            tariff_applied: tariff.is_some(),
            current_annual_cost,
            post_solar_annual_cost,
            annual_savings,
            payback_years: payback_years(net_system_cost, annual_savings),
            roi: return_on_investment(net_system_cost, lifetime_savings),
            npv,
            lifetime_savings,
            utility_bill_reduction,
        })
    }
}
