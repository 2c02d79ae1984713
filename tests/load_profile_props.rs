use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use solar_sizer::domain::BillRecord;
use solar_sizer::load_profile::LoadProfileBuilder;

fn bills_strategy() -> impl Strategy<Value = Vec<BillRecord>> {
    prop::collection::vec(
        (
            25i64..35,
            0.0f64..5_000.0,
            any::<bool>(),
            prop::option::of(0.0f64..40.0),
        ),
        1..24,
    )
    .prop_map(|periods| {
        let mut start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        periods
            .into_iter()
            .map(|(days, kwh, estimated, peak)| {
                let end = start + Duration::days(days);
                let mut bill = BillRecord::new(start, end, kwh);
                if estimated {
                    bill = bill.estimated();
                }
                if let Some(peak) = peak {
                    bill = bill.with_peak_kw(peak);
                }
                start = end;
                bill
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn confidence_and_load_factor_stay_in_range(bills in bills_strategy()) {
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        prop_assert!(profile.confidence >= 0.2 && profile.confidence <= 1.0);
        prop_assert!(profile.load_factor >= 0.0 && profile.load_factor <= 1.0);
        prop_assert!(profile.completeness <= 1.0);
        prop_assert_eq!(profile.bill_count, bills.len());
    }

    #[test]
    fn annual_usage_is_daily_average_times_365(bills in bills_strategy()) {
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        let total_kwh: f64 = bills.iter().map(|b| b.total_kwh).sum();
        let total_days: i64 = bills.iter().map(|b| b.billing_days()).sum();
        prop_assert_eq!(profile.total_billing_days, total_days);
        let expected = total_kwh / total_days as f64 * 365.0;
        prop_assert!((profile.annual_kwh - expected).abs() <= 1e-9 * expected.max(1.0));
    }

    #[test]
    fn peak_is_never_below_any_reported_peak(bills in bills_strategy()) {
        let profile = LoadProfileBuilder::default().build(&bills).unwrap();
        for peak in bills.iter().filter_map(|b| b.peak_kw) {
            prop_assert!(profile.peak_kw >= peak);
        }
    }
}
