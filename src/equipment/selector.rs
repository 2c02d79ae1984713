use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SizingConstraints;
use crate::domain::{EquipmentCatalogItem, EquipmentCategory, EquipmentSelection};

/// Guards `ceil` against values like 20.000000000000004.
const COUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum EquipmentError {
    #[error("no compliant {category} equipment available")]
    NoCandidates { category: EquipmentCategory },

    #[error("invalid {category} target size: {target}")]
    InvalidTarget {
        category: EquipmentCategory,
        target: f64,
    },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BudgetTier {
    Economy,
    #[default]
    Standard,
    /// Highest rating wins instead of lowest price
    Premium,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentPreferences {
    /// Soft filter; ignored when it would leave no candidates
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub tier: Option<BudgetTier>,
}

impl EquipmentPreferences {
    fn is_premium(&self) -> bool {
        self.tier == Some(BudgetTier::Premium)
    }
}

/// Bounds the selector enforces on unit counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorLimits {
    pub min_dc_ac_ratio: f64,
    pub target_dc_ac_ratio: f64,
    pub max_dc_ac_ratio: f64,
    pub max_inverter_kw: f64,
    /// Panel counts are trimmed so the array never exceeds this
    pub max_array_kw: f64,
    pub min_battery_kwh: f64,
    pub max_battery_kwh: f64,
}

impl From<&SizingConstraints> for SelectorLimits {
    fn from(c: &SizingConstraints) -> Self {
        Self {
            min_dc_ac_ratio: c.min_dc_ac_ratio,
            target_dc_ac_ratio: c.target_dc_ac_ratio,
            max_dc_ac_ratio: c.max_dc_ac_ratio,
            max_inverter_kw: c.max_inverter_kw,
            max_array_kw: c.max_array_kw(),
            min_battery_kwh: c.min_battery_kwh,
            max_battery_kwh: c.max_battery_kwh,
        }
    }
}

impl Default for SelectorLimits {
    fn default() -> Self {
        Self::from(&SizingConstraints::default())
    }
}

/// Matches abstract sizing targets to catalog items.
///
/// Pure over its inputs: the same catalog slice and target always yield the
/// same selection.
#[derive(Debug, Clone, Default)]
pub struct EquipmentSelector {
    limits: SelectorLimits,
}

impl EquipmentSelector {
    pub fn new(limits: SelectorLimits) -> Self {
        Self { limits }
    }

    pub fn select_panels(
        &self,
        catalog: &[EquipmentCatalogItem],
        target_kw: f64,
        prefs: &EquipmentPreferences,
    ) -> Result<EquipmentSelection, EquipmentError> {
        let category = EquipmentCategory::Panel;
        check_target(category, target_kw)?;
        let candidates = rated_candidates(catalog, category, prefs)?;

        let best = if prefs.is_premium() {
            candidates
                .into_iter()
                .max_by_key(|(i, w)| (OrderedFloat(*w), OrderedFloat(-i.unit_price)))
        } else {
            candidates
                .into_iter()
                .min_by_key(|(i, w)| (OrderedFloat(i.unit_price), OrderedFloat(-*w)))
        };
        let (item, watts) = best.ok_or(EquipmentError::NoCandidates { category })?;

        let mut count = units_for(target_kw * 1000.0, watts);
        let array_limit_w = (self.limits.max_array_kw + COUNT_EPSILON) * 1000.0;
        while count > 1 && count as f64 * watts > array_limit_w {
            count -= 1;
        }
        let achieved_kw = count as f64 * watts / 1000.0;
        debug!(model = %item.model, watts, count, achieved_kw, "selected panels");

        Ok(EquipmentSelection {
            item: item.clone(),
            unit_count: count,
            target_size: target_kw,
            achieved_size: achieved_kw,
        })
    }

    /// Inverter closest to `target_ac_kw` among the models whose unit count
    /// lands the array inside the DC:AC band without passing the inverter cap.
    ///
    /// When no model fits, the nearest one is still returned and the conflict
    /// is logged; a sizing run never fails on the band alone.
    pub fn select_inverter(
        &self,
        catalog: &[EquipmentCatalogItem],
        target_ac_kw: f64,
        array_kw: f64,
        battery_backup: bool,
        prefs: &EquipmentPreferences,
    ) -> Result<EquipmentSelection, EquipmentError> {
        let category = EquipmentCategory::Inverter;
        check_target(category, target_ac_kw)?;
        let mut candidates = rated_candidates(catalog, category, prefs)?;

        if battery_backup {
            let hybrids: Vec<_> = candidates
                .iter()
                .filter(|(i, _)| i.is_hybrid())
                .cloned()
                .collect();
            if hybrids.is_empty() {
                debug!("no hybrid inverters in catalog; using full candidate set");
            } else {
                candidates = hybrids;
            }
        }

        let fits = |rated_kw: f64| {
            let achieved = self.inverter_units(target_ac_kw, array_kw, rated_kw) as f64 * rated_kw;
            self.within_band(array_kw, achieved)
        };
        let in_band: Vec<_> = candidates.iter().filter(|(_, r)| fits(*r)).cloned().collect();
        if !in_band.is_empty() {
            candidates = in_band;
        }

        let (item, rated_kw) = nearest(candidates, target_ac_kw, prefs)
            .ok_or(EquipmentError::NoCandidates { category })?;

        let count = self.inverter_units(target_ac_kw, array_kw, rated_kw);
        let achieved_kw = count as f64 * rated_kw;
        if !self.within_band(array_kw, achieved_kw) {
            warn!(
                model = %item.model,
                array_kw,
                inverter_kw = achieved_kw,
                ratio = array_kw / achieved_kw,
                min_ratio = self.limits.min_dc_ac_ratio,
                max_ratio = self.limits.max_dc_ac_ratio,
                max_inverter_kw = self.limits.max_inverter_kw,
                "no inverter fits the DC:AC band and capacity limit; using nearest rating"
            );
        }
        debug!(model = %item.model, rated_kw, count, "selected inverter");

        Ok(EquipmentSelection {
            item: item.clone(),
            unit_count: count,
            target_size: target_ac_kw,
            achieved_size: achieved_kw,
        })
    }

    /// Units covering the target, topped up until the array is within the max
    /// ratio and trimmed back under the inverter cap.
    fn inverter_units(&self, target_ac_kw: f64, array_kw: f64, rated_kw: f64) -> u32 {
        let cap = self.limits.max_inverter_kw + COUNT_EPSILON;
        let mut count = units_for(target_ac_kw, rated_kw);
        while array_kw / (count as f64 * rated_kw) > self.limits.max_dc_ac_ratio + COUNT_EPSILON
            && (count + 1) as f64 * rated_kw <= cap
        {
            count += 1;
        }
        while count > 1 && count as f64 * rated_kw > cap {
            count -= 1;
        }
        count
    }

    fn within_band(&self, array_kw: f64, inverter_kw: f64) -> bool {
        let ratio = array_kw / inverter_kw;
        ratio >= self.limits.min_dc_ac_ratio - COUNT_EPSILON
            && ratio <= self.limits.max_dc_ac_ratio + COUNT_EPSILON
            && inverter_kw <= self.limits.max_inverter_kw + COUNT_EPSILON
    }

    pub fn select_battery(
        &self,
        catalog: &[EquipmentCatalogItem],
        target_kwh: f64,
        prefs: &EquipmentPreferences,
    ) -> Result<EquipmentSelection, EquipmentError> {
        let category = EquipmentCategory::Battery;
        check_target(category, target_kwh)?;
        let candidates = rated_candidates(catalog, category, prefs)?;
        let (item, capacity) = nearest(candidates, target_kwh, prefs)
            .ok_or(EquipmentError::NoCandidates { category })?;

        let mut count = units_for(target_kwh, capacity);
        let achieved = |n: u32| n as f64 * capacity;
        while achieved(count) < self.limits.min_battery_kwh - COUNT_EPSILON {
            count += 1;
        }
        while count > 1
            && achieved(count) > self.limits.max_battery_kwh + COUNT_EPSILON
            && achieved(count - 1) >= self.limits.min_battery_kwh - COUNT_EPSILON
        {
            count -= 1;
        }
        debug!(model = %item.model, capacity, count, "selected battery");

        Ok(EquipmentSelection {
            item: item.clone(),
            unit_count: count,
            target_size: target_kwh,
            achieved_size: achieved(count),
        })
    }

    /// Cheapest mounting kit, one per panel. `None` when the catalog has none.
    pub fn select_mounting(
        &self,
        catalog: &[EquipmentCatalogItem],
        panel_count: u32,
    ) -> Option<EquipmentSelection> {
        catalog
            .iter()
            .filter(|i| i.category == EquipmentCategory::Mounting && i.is_selectable())
            .min_by_key(|i| OrderedFloat(i.unit_price))
            .map(|item| EquipmentSelection {
                item: item.clone(),
                unit_count: panel_count,
                target_size: panel_count as f64,
                achieved_size: panel_count as f64,
            })
    }
}

fn check_target(category: EquipmentCategory, target: f64) -> Result<(), EquipmentError> {
    if target.is_finite() && target > 0.0 {
        Ok(())
    } else {
        Err(EquipmentError::InvalidTarget { category, target })
    }
}

fn units_for(target: f64, unit_size: f64) -> u32 {
    ((target / unit_size) - COUNT_EPSILON).ceil().max(1.0) as u32
}

/// Compliant, available, rated items of `category`, narrowed by manufacturer
/// when that leaves at least one.
fn rated_candidates<'a>(
    catalog: &'a [EquipmentCatalogItem],
    category: EquipmentCategory,
    prefs: &EquipmentPreferences,
) -> Result<Vec<(&'a EquipmentCatalogItem, f64)>, EquipmentError> {
    let all: Vec<_> = catalog
        .iter()
        .filter(|i| i.category == category && i.is_selectable())
        .filter_map(|i| i.rated_size().map(|r| (i, r)))
        .collect();
    if all.is_empty() {
        return Err(EquipmentError::NoCandidates { category });
    }

    if let Some(wanted) = prefs.manufacturer.as_deref() {
        let preferred: Vec<_> = all
            .iter()
            .filter(|(i, _)| i.manufacturer.eq_ignore_ascii_case(wanted))
            .cloned()
            .collect();
        if !preferred.is_empty() {
            return Ok(preferred);
        }
        debug!(%category, manufacturer = wanted, "preferred manufacturer not in catalog");
    }
    Ok(all)
}

/// Closest rating to `target`; ties go to the lower price, or the higher
/// rating for premium.
fn nearest<'a>(
    candidates: Vec<(&'a EquipmentCatalogItem, f64)>,
    target: f64,
    prefs: &EquipmentPreferences,
) -> Option<(&'a EquipmentCatalogItem, f64)> {
    let premium = prefs.is_premium();
    candidates.into_iter().min_by_key(|(i, r)| {
        let tie = if premium { -*r } else { i.unit_price };
        (OrderedFloat((r - target).abs()), OrderedFloat(tie))
    })
}
