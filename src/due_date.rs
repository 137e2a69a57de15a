use chrono::{Datelike, NaiveDate};

/// Number of days in the given month. Months outside `1..=12` are clamped.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    match month.clamp(1, 12) {
        4 | 6 | 9 | 11 => 30,
        2 => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
        _ => 31,
    }
}

/// Resolves the calendar date of a monthly recurring expense.
///
/// `day_of_month` is clamped to the last valid day of the month, so a
/// "day 31" expense falls on the 30th in April and on the 28th or 29th in
/// February. Total: any input produces a date.
pub fn resolve_due_date(year: i32, month: u32, day_of_month: i32) -> NaiveDate {
    let year = year.clamp(NaiveDate::MIN.year(), NaiveDate::MAX.year());
    let month = month.clamp(1, 12);
    let last_day = last_day_of_month(year, month) as i32;
    let day = day_of_month.clamp(1, last_day) as u32;

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Same day of month, `months` months later, clamped like [`resolve_due_date`].
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;

    resolve_due_date(year, month, date.day() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_resolve_keeps_valid_day() {
        assert_eq!(resolve_due_date(2024, 3, 15), ymd(2024, 3, 15));
        assert_eq!(resolve_due_date(2024, 1, 31), ymd(2024, 1, 31));
    }

    #[test]
    fn test_resolve_clamps_to_month_end() {
        assert_eq!(resolve_due_date(2024, 2, 31), ymd(2024, 2, 29));
        assert_eq!(resolve_due_date(2023, 2, 30), ymd(2023, 2, 28));
        assert_eq!(resolve_due_date(2024, 4, 31), ymd(2024, 4, 30));
        assert_eq!(resolve_due_date(2023, 11, 31), ymd(2023, 11, 30));
    }

    #[test]
    fn test_resolve_every_short_month_clamps_to_last_day() {
        for year in [2023, 2024, 1900, 2000] {
            for month in 1..=12 {
                let last = last_day_of_month(year, month);
                for day in 29..=31 {
                    let resolved = resolve_due_date(year, month, day);
                    let expected = (day as u32).min(last);
                    assert_eq!(resolved, ymd(year, month, expected), "{year}-{month} day {day}");
                }
            }
        }
    }

    #[test]
    fn test_leap_years() {
        assert_eq!(last_day_of_month(2000, 2), 29);
        assert_eq!(last_day_of_month(1900, 2), 28);
        assert_eq!(last_day_of_month(2024, 2), 29);
        assert_eq!(last_day_of_month(2023, 2), 28);
    }

    #[test]
    fn test_resolve_coerces_out_of_range_inputs() {
        assert_eq!(resolve_due_date(2024, 13, 0), ymd(2024, 12, 1));
        assert_eq!(resolve_due_date(2024, 0, -5), ymd(2024, 1, 1));
    }

    #[test]
    fn test_resolve_formats_as_iso_date() {
        assert_eq!(resolve_due_date(2024, 2, 31).to_string(), "2024-02-29");
    }

    #[test]
    fn test_add_months_rolls_over_year() {
        assert_eq!(add_months(ymd(2024, 11, 10), 3), ymd(2025, 2, 10));
        assert_eq!(add_months(ymd(2024, 1, 31), 1), ymd(2024, 2, 29));
        assert_eq!(add_months(ymd(2024, 1, 31), 2), ymd(2024, 3, 31));
        assert_eq!(add_months(ymd(2024, 5, 5), 0), ymd(2024, 5, 5));
    }
}
