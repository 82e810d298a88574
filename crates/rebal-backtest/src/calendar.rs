//! Monthly step calendar.

use chrono::{Months, NaiveDate};

use rebal_md::month_start;

/// `months` first-of-month dates, oldest first, the last one being the
/// first day of `end`'s month.
pub fn step_dates(end: NaiveDate, months: usize) -> Vec<NaiveDate> {
    let last = month_start(end);
    let mut out: Vec<NaiveDate> = (0..months)
        .filter_map(|back| u32::try_from(back).ok())
        .filter_map(|back| last.checked_sub_months(Months::new(back)))
        .collect();
    out.reverse();
    out
}

/// Inclusive data window for a step calendar: from the first day of the
/// month before the first step (so the first step already has a month-end
/// observation behind it) to `end`.
pub fn data_window(steps: &[NaiveDate], end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = steps.first().copied().unwrap_or_else(|| month_start(end));
    let start = first.checked_sub_months(Months::new(1)).unwrap_or(first);
    (start, end.max(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn steps_end_at_end_month_start() {
        let s = step_dates(d(2025, 5, 1), 3);
        assert_eq!(s, vec![d(2025, 3, 1), d(2025, 4, 1), d(2025, 5, 1)]);
    }

    #[test]
    fn steps_cross_year_boundary() {
        let s = step_dates(d(2024, 2, 17), 4);
        assert_eq!(s.first(), Some(&d(2023, 11, 1)));
        assert_eq!(s.last(), Some(&d(2024, 2, 1)));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn zero_months_is_empty() {
        assert!(step_dates(d(2025, 5, 1), 0).is_empty());
    }

    #[test]
    fn window_starts_one_month_before_first_step() {
        let s = step_dates(d(2025, 5, 1), 24);
        assert_eq!(s[0], d(2023, 6, 1));
        assert_eq!(data_window(&s, d(2025, 5, 1)), (d(2023, 5, 1), d(2025, 5, 1)));
    }
}
