use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{GeoLocation, Tariff};

/// What is known about a site's utility when resolving its tariff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffQuery {
    pub utility_name: Option<String>,
    pub rate_schedule: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoLocation>,
}

#[async_trait]
pub trait TariffLookup: Send + Sync {
    /// `Ok(None)` when no tariff matches.
    async fn find_tariff(&self, query: &TariffQuery) -> Result<Option<Tariff>>;
}

/// Tariff lookup over a fixed list, matched by utility name and rate schedule.
#[derive(Debug, Clone, Default)]
pub struct StaticTariffLookup {
    tariffs: Vec<Tariff>,
}

impl StaticTariffLookup {
    pub fn new(tariffs: Vec<Tariff>) -> Self {
        Self { tariffs }
    }

    /// Reads a JSON array of tariffs.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read tariffs from {}", path.display()))?;
        let tariffs: Vec<Tariff> =
            serde_json::from_str(&raw).context("tariff JSON parse failed")?;
        Ok(Self::new(tariffs))
    }
}

#[async_trait]
impl TariffLookup for StaticTariffLookup {
    async fn find_tariff(&self, query: &TariffQuery) -> Result<Option<Tariff>> {
        let Some(utility) = query.utility_name.as_deref() else {
            return Ok(None);
        };
        let mut same_utility = self
            .tariffs
            .iter()
            .filter(|t| t.utility_name.eq_ignore_ascii_case(utility.trim()));

        let found = match query.rate_schedule.as_deref() {
            Some(schedule) => {
                same_utility.find(|t| t.rate_schedule.eq_ignore_ascii_case(schedule.trim()))
            }
            None => same_utility.next(),
        };
        Ok(found.cloned())
    }
}
