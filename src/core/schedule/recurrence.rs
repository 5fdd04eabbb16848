//! Recurrence rules
//!
//! Pure calendar arithmetic on local dates. Monthly schedules anchored past
//! the end of a shorter month fire on that month's last day.

use crate::core::schedule::entry::{RecurrenceUnit, ScheduleEntry};
use chrono::{Datelike, NaiveDate};

/// Whether `entry` fires on the local date `today`
pub fn is_due(entry: &ScheduleEntry, today: NaiveDate) -> bool {
    if !entry.is_enabled() {
        return false;
    }
    occurs_on(entry.anchor.date_naive(), entry.every, entry.unit, today)
}

/// Whether a recurrence anchored on `anchor` fires on `today`
pub fn occurs_on(anchor: NaiveDate, every: u32, unit: RecurrenceUnit, today: NaiveDate) -> bool {
    if every == 0 || today < anchor {
        return false;
    }
    if today == anchor {
        return true;
    }

    let every = i64::from(every);
    let days = (today - anchor).num_days();

    match unit {
        RecurrenceUnit::Day => days % every == 0,
        RecurrenceUnit::Week => days % 7 == 0 && (days / 7) % every == 0,
        RecurrenceUnit::Month => {
            let months = month_index(today) - month_index(anchor);
            months > 0
                && months % every == 0
                && today.day() == anchor.day().min(days_in_month(today))
        }
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test_case("2019-09-26", 1, RecurrenceUnit::Day, "2019-10-07", true ; "daily eleven days later")]
    #[test_case("2019-09-26", 2, RecurrenceUnit::Day, "2019-10-07", false ; "every other day odd gap")]
    #[test_case("2019-10-07", 1, RecurrenceUnit::Week, "2019-10-07", true ; "weekly on anchor day")]
    #[test_case("2019-09-30", 1, RecurrenceUnit::Week, "2019-10-07", true ; "weekly one week later")]
    #[test_case("2019-09-23", 2, RecurrenceUnit::Week, "2019-10-07", true ; "biweekly")]
    #[test_case("2019-09-30", 2, RecurrenceUnit::Week, "2019-10-07", false ; "biweekly off week")]
    #[test_case("2019-10-01", 1, RecurrenceUnit::Week, "2019-10-07", false ; "weekly wrong weekday")]
    #[test_case("2019-07-31", 1, RecurrenceUnit::Month, "2019-09-30", true ; "month end clamps from 31")]
    #[test_case("2019-08-31", 1, RecurrenceUnit::Month, "2019-09-30", true ; "month end clamps from 31 next month")]
    #[test_case("2019-08-30", 1, RecurrenceUnit::Month, "2019-09-30", true ; "same day of month")]
    #[test_case("2019-08-29", 1, RecurrenceUnit::Month, "2019-09-30", false ; "earlier day of month")]
    #[test_case("2019-07-30", 2, RecurrenceUnit::Month, "2019-09-30", true ; "bimonthly")]
    #[test_case("2019-08-30", 2, RecurrenceUnit::Month, "2019-09-30", false ; "bimonthly off month")]
    #[test_case("2020-01-31", 1, RecurrenceUnit::Month, "2020-02-29", true ; "leap february")]
    #[test_case("2019-10-08", 1, RecurrenceUnit::Day, "2019-10-07", false ; "before anchor")]
    fn test_occurs_on(anchor: &str, every: u32, unit: RecurrenceUnit, today: &str, due: bool) {
        assert_eq!(occurs_on(date(anchor), every, unit, date(today)), due);
    }

    #[test]
    fn test_zero_interval_never_due() {
        let day = date("2019-10-07");
        assert!(!occurs_on(day, 0, RecurrenceUnit::Day, day));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(date("2019-02-10")), 28);
        assert_eq!(days_in_month(date("2020-02-10")), 29);
        assert_eq!(days_in_month(date("2019-12-01")), 31);
    }
}
