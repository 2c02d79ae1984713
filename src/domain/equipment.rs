use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EquipmentCategory {
    Panel,
    Inverter,
    Battery,
    Mounting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Availability {
    InStock,
    LowStock,
    OutOfStock,
    Discontinued,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::InStock | Availability::LowStock)
    }
}

/// Specification keys read for each category, first match wins.
const PANEL_WATTAGE_KEYS: &[&str] = &["wattage", "watts", "power_w"];
const INVERTER_POWER_KEYS: &[&str] = &["power_kw", "rated_power_kw", "ac_power_kw"];
const BATTERY_CAPACITY_KEYS: &[&str] = &["capacity_kwh", "usable_capacity_kwh"];
const HYBRID_KEYS: &[&str] = &["hybrid", "battery_compatible"];

/// A purchasable component from the read-only equipment catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentCatalogItem {
    pub id: Uuid,
    pub category: EquipmentCategory,
    pub manufacturer: String,
    pub model: String,
    pub unit_price: f64,
    #[serde(default)]
    pub specifications: HashMap<String, serde_json::Value>,
    pub compliant: bool,
    pub availability: Availability,
}

impl EquipmentCatalogItem {
    pub fn is_selectable(&self) -> bool {
        self.compliant && self.availability.is_available()
    }

    /// Numeric specification value; numbers stored as strings are accepted.
    pub fn spec_f64(&self, key: &str) -> Option<f64> {
        match self.specifications.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn first_spec(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .find_map(|k| self.spec_f64(k))
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    pub fn panel_wattage(&self) -> Option<f64> {
        self.first_spec(PANEL_WATTAGE_KEYS)
    }

    pub fn inverter_power_kw(&self) -> Option<f64> {
        self.first_spec(INVERTER_POWER_KEYS)
    }

    pub fn battery_capacity_kwh(&self) -> Option<f64> {
        self.first_spec(BATTERY_CAPACITY_KEYS)
    }

    pub fn is_hybrid(&self) -> bool {
        HYBRID_KEYS.iter().any(|k| {
            matches!(
                self.specifications.get(*k),
                Some(serde_json::Value::Bool(true))
            ) || matches!(
                self.specifications.get(*k),
                Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("true")
            )
        })
    }

    /// The rating the selector sizes against: W for panels, kW for inverters,
    /// kWh for batteries. Mounting items have no rating.
    pub fn rated_size(&self) -> Option<f64> {
        match self.category {
            EquipmentCategory::Panel => self.panel_wattage(),
            EquipmentCategory::Inverter => self.inverter_power_kw(),
            EquipmentCategory::Battery => self.battery_capacity_kwh(),
            EquipmentCategory::Mounting => None,
        }
    }
}

/// A chosen catalog item together with how many units are needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSelection {
    pub item: EquipmentCatalogItem,
    pub unit_count: u32,
    /// Size the selector was asked for (kW, or kWh for batteries)
    pub target_size: f64,
    /// Size actually delivered by `unit_count` whole units
    pub achieved_size: f64,
}

impl EquipmentSelection {
    pub fn total_cost(&self) -> f64 {
        self.item.unit_price * self.unit_count as f64
    }
}
