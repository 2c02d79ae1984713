use serde::{Deserialize, Serialize};

/// One block of an energy-rate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTier {
    pub rate_per_kwh: f64,
    /// Upper bound of the block in kWh/month; `None` for the last block.
    #[serde(default)]
    pub up_to_kwh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedCharge {
    pub name: String,
    pub monthly_amount: f64,
}

/// A utility tariff as returned by the tariff-lookup collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub utility_name: String,
    pub rate_schedule: String,
    pub energy_tiers: Vec<RateTier>,
    #[serde(default)]
    pub fixed_charges: Vec<FixedCharge>,
}

impl Tariff {
    /// Rate of the first energy tier.
    pub fn energy_rate(&self) -> Option<f64> {
        self.energy_tiers.first().map(|t| t.rate_per_kwh)
    }

    pub fn monthly_fixed_charges(&self) -> f64 {
        self.fixed_charges.iter().map(|c| c.monthly_amount).sum()
    }
}
