//! Restaurant-local calendar helpers
//!
//! The restaurant runs on a fixed UTC offset. Reports, "today" filters and
//! hourly buckets are all computed in that local time while rows store UTC.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

/// Local calendar date of a UTC instant
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Local hour (0-23) of a UTC instant
pub fn local_hour(instant: DateTime<Utc>, offset: FixedOffset) -> u32 {
    instant.with_timezone(&offset).hour()
}

/// Today's local date
pub fn today(offset: FixedOffset) -> NaiveDate {
    local_date(Utc::now(), offset)
}

/// UTC instant of local midnight at the start of `date`
pub fn day_start_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    // A fixed offset never produces gaps or folds.
    match offset.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(local) => local.with_timezone(&Utc),
        _ => midnight.and_utc(),
    }
}

/// Half-open UTC range `[start of first, start of day after last)`
pub fn local_days_utc_range(
    first: NaiveDate,
    last: NaiveDate,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        day_start_utc(first, offset),
        day_start_utc(last, offset) + Duration::days(1),
    )
}

/// UTC instant for a local wall-clock time
pub fn local_to_utc(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    offset: FixedOffset,
) -> DateTime<Utc> {
    day_start_utc(date, offset)
        + Duration::hours(i64::from(hour))
        + Duration::minutes(i64::from(minute))
}
