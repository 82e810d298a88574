//! Raw observations → month-end series.
//!
//! Rate series are compounded into a cumulative growth factor (base 1.0) and
//! used as the "price" of the instruments that track them. All functions sort
//! their input by date and drop non-finite values.

use chrono::NaiveDate;

use crate::{month_end, MonthlySeries, Observation};

fn sorted_finite(obs: &[Observation]) -> Vec<Observation> {
    let mut v: Vec<Observation> = obs.iter().copied().filter(|o| o.value.is_finite()).collect();
    v.sort_by_key(|o| o.date);
    v
}

/// Last observation of each month, dated at the month end.
pub fn month_end_last(obs: &[Observation]) -> MonthlySeries {
    let mut out = MonthlySeries::new();
    for o in sorted_finite(obs) {
        out.insert(month_end(o.date), o.value);
    }
    out
}

/// Daily percent rates compounded day by day, sampled at each month's last
/// business day and dated at the month end.
pub fn compound_daily_rates(obs: &[Observation]) -> MonthlySeries {
    let mut out = MonthlySeries::new();
    let mut factor = 1.0;
    for o in sorted_finite(obs) {
        factor *= 1.0 + o.value / 100.0;
        out.insert(month_end(o.date), factor);
    }
    out
}

/// Monthly percent rates compounded month by month, dated at the month end.
pub fn compound_monthly_rates(obs: &[Observation]) -> MonthlySeries {
    // Same fold as the daily case; only one observation per month is expected.
    compound_daily_rates(obs)
}

/// Factor series for a constant annual rate: `(1 + m)^k` at the k-th month
/// end inside `[start, end]`, with `m = (1 + annual)^(1/12) − 1`.
pub fn fixed_annual_factors(start: NaiveDate, end: NaiveDate, annual_rate: f64) -> MonthlySeries {
    let monthly = (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0;
    let mut out = MonthlySeries::new();
    let mut cursor = month_end(start);
    let mut k: i32 = 1;
    while cursor <= end {
        out.insert(cursor, (1.0 + monthly).powi(k));
        k += 1;
        match cursor.succ_opt() {
            Some(next) => cursor = month_end(next),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_rates_compound_and_sample_last_business_day() {
        let obs = vec![
            Observation::new(d(2024, 2, 1), 0.05),
            Observation::new(d(2024, 1, 30), 0.04),
            Observation::new(d(2024, 1, 31), 0.04),
        ];
        let s = compound_daily_rates(&obs);
        assert_eq!(s.len(), 2);
        let jan = 1.0004_f64 * 1.0004;
        assert!((s.get(d(2024, 1, 31)).unwrap() - jan).abs() < 1e-12);
        assert!((s.get(d(2024, 2, 29)).unwrap() - jan * 1.0005).abs() < 1e-12);
    }

    #[test]
    fn monthly_rates_are_dated_at_month_end() {
        let obs = vec![
            Observation::new(d(2024, 1, 1), 0.42),
            Observation::new(d(2024, 2, 1), 0.83),
        ];
        let s = compound_monthly_rates(&obs);
        assert!((s.get(d(2024, 1, 31)).unwrap() - 1.0042).abs() < 1e-12);
        assert!((s.get(d(2024, 2, 29)).unwrap() - 1.0042 * 1.0083).abs() < 1e-12);
    }

    #[test]
    fn fixed_annual_rate_compounds_to_annual_after_twelve_months() {
        let s = fixed_annual_factors(d(2023, 1, 15), d(2023, 12, 31), 0.09);
        assert_eq!(s.len(), 12);
        assert_eq!(s.first_date(), Some(d(2023, 1, 31)));
        assert!((s.get(d(2023, 12, 31)).unwrap() - 1.09).abs() < 1e-12);
    }

    #[test]
    fn fixed_annual_rate_excludes_month_end_after_window() {
        let s = fixed_annual_factors(d(2023, 1, 1), d(2023, 3, 30), 0.07);
        assert_eq!(s.len(), 2);
        assert!(s.get(d(2023, 3, 31)).is_none());
    }

    #[test]
    fn month_end_last_keeps_last_value_and_drops_nan() {
        let obs = vec![
            Observation::new(d(2024, 3, 28), 101.0),
            Observation::new(d(2024, 3, 5), 99.0),
            Observation::new(d(2024, 4, 2), f64::NAN),
        ];
        let s = month_end_last(&obs);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(d(2024, 3, 31)), Some(101.0));
    }
}
