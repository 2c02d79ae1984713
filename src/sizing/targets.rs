use crate::config::SizingConstraints;
use crate::domain::{BackupRequirements, LoadProfile, SizingGoal, SizingTargets};

/// Share of annual load offset by solar for each goal.
pub const NET_ZERO_OFFSET: f64 = 1.0;
pub const ROI_OPTIMIZATION_OFFSET: f64 = 0.85;
pub const BILL_REDUCTION_OFFSET: f64 = 0.8;

/// The most ambitious offset among the stated goals; bill reduction when
/// none of them set one.
pub fn offset_for_goals(goals: &[SizingGoal]) -> f64 {
    if goals.contains(&SizingGoal::NetZero) {
        NET_ZERO_OFFSET
    } else if goals.contains(&SizingGoal::RoiOptimization) {
        ROI_OPTIMIZATION_OFFSET
    } else {
        BILL_REDUCTION_OFFSET
    }
}

/// Abstract solar/battery/inverter targets for a load, clamped to the
/// configured bounds. The solar ceiling is the smaller of the configured
/// maximum and the largest array the inverter cap serves inside the ratio band.
pub fn derive_targets(
    load: &LoadProfile,
    goals: &[SizingGoal],
    backup: &BackupRequirements,
    c: &SizingConstraints,
) -> SizingTargets {
    let offset_fraction = offset_for_goals(goals);
    let solar_kw = (load.annual_kwh * offset_fraction / c.specific_yield_kwh_per_kw)
        .clamp(c.min_solar_kw, c.max_array_kw().max(c.min_solar_kw));

    let (battery_kwh, backup_hours) = if goals.contains(&SizingGoal::BackupPower) {
        let hours = backup.duration_hours.unwrap_or(c.default_backup_hours);
        let critical_kw = match &backup.critical_loads {
            Some(profile) => profile.total_kw,
            None => load.peak_kw * c.critical_load_fraction,
        };
        let kwh = (critical_kw * hours).clamp(c.min_battery_kwh, c.max_battery_kwh);
        (Some(kwh), Some(hours))
    } else {
        (None, None)
    };

    SizingTargets {
        offset_fraction,
        solar_kw,
        battery_kwh,
        inverter_kw: inverter_target(solar_kw, battery_kwh, c),
        backup_hours,
    }
}

/// Larger of the array under the DC:AC oversizing assumption and the
/// battery's discharge ceiling, capped at the inverter limit.
///
/// The oversizing ratio never exceeds the max ratio, so the array side alone
/// keeps the inverter at or above `solar / max_dc_ac_ratio`.
pub fn inverter_target(solar_kw: f64, battery_kwh: Option<f64>, c: &SizingConstraints) -> f64 {
    let from_array = solar_kw / c.target_dc_ac_ratio;
    let from_battery = battery_kwh.map_or(0.0, |kwh| kwh * c.battery_c_rate);
    from_array.max(from_battery).min(c.max_inverter_kw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CriticalLoadProfile;
    use chrono::Utc;
    use rstest::rstest;

    fn load(annual_kwh: f64, peak_kw: f64) -> LoadProfile {
        LoadProfile {
            annual_kwh,
            average_daily_kwh: annual_kwh / 365.0,
            peak_kw,
            load_factor: 0.2,
            time_of_use: None,
            confidence: 0.8,
            completeness: 1.0,
            bill_count: 12,
            total_billing_days: 365,
            estimated_fraction: 0.0,
            utility_name: None,
            rate_schedule: None,
            built_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(&[SizingGoal::NetZero], 10.0)]
    #[case(&[SizingGoal::BillReduction], 8.0)]
    #[case(&[SizingGoal::RoiOptimization], 8.5)]
    #[case(&[], 8.0)]
    #[case(&[SizingGoal::BillReduction, SizingGoal::NetZero], 10.0)]
    fn test_goal_offsets(#[case] goals: &[SizingGoal], #[case] solar_kw: f64) {
        let t = derive_targets(
            &load(12_000.0, 6.0),
            goals,
            &BackupRequirements::default(),
            &SizingConstraints::default(),
        );
        assert!((t.solar_kw - solar_kw).abs() < 1e-9, "{} vs {}", t.solar_kw, solar_kw);
        assert_eq!(t.battery_kwh, None);
    }

    #[test]
    fn test_backup_without_critical_profile_uses_peak_fraction() {
        let t = derive_targets(
            &load(12_000.0, 10.0),
            &[SizingGoal::BackupPower],
            &BackupRequirements::default(),
            &SizingConstraints::default(),
        );
        assert!((t.battery_kwh.unwrap() - 12.0).abs() < 1e-9);
        assert_eq!(t.backup_hours, Some(4.0));
    }

    #[test]
    fn test_backup_with_critical_profile() {
        let backup = BackupRequirements {
            duration_hours: Some(8.0),
            critical_loads: Some(CriticalLoadProfile {
                total_kw: 3.0,
                simultaneous_kw: 2.0,
            }),
        };
        let t = derive_targets(
            &load(12_000.0, 10.0),
            &[SizingGoal::BackupPower],
            &backup,
            &SizingConstraints::default(),
        );
        assert_eq!(t.battery_kwh, Some(24.0));
        assert_eq!(t.backup_hours, Some(8.0));
    }

    #[rstest]
    #[case(100.0, 1.0, 5.0)]
    #[case(2_000_000.0, 75.0, 200.0)]
    fn test_targets_are_clamped(
        #[case] annual_kwh: f64,
        #[case] solar_kw: f64,
        #[case] battery_kwh: f64,
    ) {
        let peak = annual_kwh / 1000.0;
        let t = derive_targets(
            &load(annual_kwh, peak),
            &[SizingGoal::NetZero, SizingGoal::BackupPower],
            &BackupRequirements::default(),
            &SizingConstraints::default(),
        );
        assert_eq!(t.solar_kw, solar_kw);
        assert_eq!(t.battery_kwh, Some(battery_kwh));
        assert!(t.inverter_kw <= 50.0);
    }

    #[test]
    fn test_solar_ceiling_respects_inverter_cap() {
        let t = derive_targets(
            &load(150_000.0, 60.0),
            &[SizingGoal::NetZero],
            &BackupRequirements::default(),
            &SizingConstraints::default(),
        );
        assert_eq!(t.solar_kw, 75.0);
        assert_eq!(t.inverter_kw, 50.0);
        assert!(t.solar_kw / t.inverter_kw <= 1.5);
    }

    #[test]
    fn test_inverter_follows_larger_constraint() {
        let c = SizingConstraints::default();
        assert!((inverter_target(9.0, None, &c) - 7.2).abs() < 1e-9);
        assert!((inverter_target(9.0, Some(20.0), &c) - 10.0).abs() < 1e-9);
        assert_eq!(inverter_target(100.0, None, &c), 50.0);
        assert!(inverter_target(9.0, None, &c) >= 9.0 / c.max_dc_ac_ratio);
    }
}
