use crate::config::SizingConstraints;
use crate::domain::AlternativeOption;

const SMALLER_SCALE: f64 = 0.75;
const LARGER_SCALE: f64 = 1.25;
const LARGER_BATTERY_SCALE: f64 = 1.5;
/// Battery suggested for the larger option when none was sized
const STARTER_BATTERY_KWH: f64 = 10.0;

/// Exactly two illustrative options around the recommended system: one
/// smaller and cheaper, one larger and more independent. Neither is costed.
pub fn generate_alternatives(
    solar_kw: f64,
    battery_kwh: Option<f64>,
    c: &SizingConstraints,
) -> Vec<AlternativeOption> {
    let max_solar_kw = c.max_array_kw().max(c.min_solar_kw);
    let smaller_kw = round_tenth((solar_kw * SMALLER_SCALE).clamp(c.min_solar_kw, max_solar_kw));
    let larger_kw = round_tenth((solar_kw * LARGER_SCALE).clamp(c.min_solar_kw, max_solar_kw));
    let larger_battery = battery_kwh
        .map(|b| b * LARGER_BATTERY_SCALE)
        .unwrap_or(STARTER_BATTERY_KWH)
        .clamp(c.min_battery_kwh, c.max_battery_kwh);

    vec![
        AlternativeOption {
            label: "smaller".to_string(),
            description: format!("{smaller_kw:.1} kW solar without battery storage"),
            solar_size_kw: smaller_kw,
            battery_size_kwh: None,
            tradeoff: "Lower up-front cost and faster payback; offsets less of the annual bill \
                       and provides no outage protection."
                .to_string(),
        },
        AlternativeOption {
            label: "larger".to_string(),
            description: format!(
                "{larger_kw:.1} kW solar with {larger_battery:.1} kWh of battery storage"
            ),
            solar_size_kw: larger_kw,
            battery_size_kwh: Some(round_tenth(larger_battery)),
            tradeoff: "Greater grid independence and longer backup; higher up-front cost and a \
                       larger share of output exported at the net-metering credit rate."
                .to_string(),
        },
    ]
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
