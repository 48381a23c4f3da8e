use chrono::{
    DateTime, Datelike, Days, LocalResult, Months, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::errors::{BillError, Result};

/// how far back we look for the start of a daylight-saving gap
const MAX_GAP_MINUTES: i64 = 4 * 60;
const GAP_PROBE_MINUTES: i64 = 15;

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// last calendar day of the date's month
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    with_day_clamped(date, 31)
}

/// same year and month, day clamped to the month length
pub fn with_day_clamped(date: NaiveDate, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(date.year(), date.month()));
    // day is within the month, so this cannot fail
    date.with_day(day).unwrap_or(date)
}

/// calendar-aware month addition; the day is clamped to the target month
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| BillError::CalculationError {
            message: format!("{} + {} months is out of range", date, months),
        })
}

pub fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| BillError::CalculationError {
            message: format!("{} + {} days is out of range", date, days),
        })
}

/// move a saturday or sunday forward to the following monday
pub fn skip_weekend(date: NaiveDate) -> NaiveDate {
    let shift = match date.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };
    date.checked_add_days(Days::new(shift)).unwrap_or(date)
}

/// whole months from `from` to `to`, ignoring days
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// resolve a local wall-clock time in `tz` to a utc instant
///
/// ambiguous times (clocks falling back) take the earlier instant. a time
/// inside a spring-forward gap is shifted forward by the length of the gap,
/// so 02:30 on a one-hour gap starting at 02:00 becomes 03:30.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => shift_across_gap(tz, local),
    }
}

/// read `local` with the utc offset in force just before the gap
fn shift_across_gap(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>> {
    let mut minutes = GAP_PROBE_MINUTES;
    while minutes <= MAX_GAP_MINUTES {
        let before = local - chrono::Duration::minutes(minutes);
        if let Some(dt) = tz.from_local_datetime(&before).earliest() {
            let offset = i64::from(dt.offset().fix().local_minus_utc());
            return Ok(Utc.from_utc_datetime(&(local - chrono::Duration::seconds(offset))));
        }
        minutes += GAP_PROBE_MINUTES;
    }
    Err(BillError::CalculationError {
        message: format!("local time {} does not exist in {}", local, tz),
    })
}
