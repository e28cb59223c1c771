//! Column encodings shared by the stores
//!
//! Timestamps are fixed-width RFC 3339 UTC strings so that lexical order in
//! SQL matches chronological order. Money is stored as text at two decimal
//! places.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // Rows written by SQLite's strftime lack an offset.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(to_from_sql_error)
}

pub fn date_str(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(to_from_sql_error)
}

/// Round to cents and pin the scale so it renders as `12.50`
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn decimal_text(value: Decimal) -> String {
    money(value).to_string()
}

pub fn parse_decimal(value: &str) -> Result<Decimal, rusqlite::Error> {
    Decimal::from_str(value)
        .map(money)
        .map_err(to_from_sql_error)
}

pub fn get_ts(row: &Row<'_>, column: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    parse_ts(&raw)
}

pub fn get_opt_ts(row: &Row<'_>, column: &str) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.as_deref().map(parse_ts).transpose()
}

pub fn get_date(row: &Row<'_>, column: &str) -> Result<NaiveDate, rusqlite::Error> {
    let raw: String = row.get(column)?;
    parse_date(&raw)
}

pub fn get_decimal(row: &Row<'_>, column: &str) -> Result<Decimal, rusqlite::Error> {
    let raw: String = row.get(column)?;
    parse_decimal(&raw)
}

pub fn get_opt_decimal(row: &Row<'_>, column: &str) -> Result<Option<Decimal>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.as_deref().map(parse_decimal).transpose()
}

pub fn to_from_sql_error<E>(err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

/// True when a write failed on a UNIQUE constraint
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        assert!(ts(early) < ts(late));
        assert_eq!(ts(early), "2025-03-09T23:59:59.000000Z");
    }

    #[test]
    fn test_timestamp_parses_back() {
        let value = Utc.with_ymd_and_hms(2024, 12, 31, 8, 15, 0).unwrap();
        assert_eq!(parse_ts(&ts(value)).unwrap(), value);
        assert_eq!(
            parse_ts("2024-12-31 08:15:00.000").unwrap(),
            value
        );
    }

    #[test]
    fn test_money_pins_two_places() {
        assert_eq!(decimal_text(Decimal::new(125, 0)), "125.00");
        assert_eq!(decimal_text(Decimal::new(12345, 3)), "12.35");
        assert_eq!(parse_decimal("99.5").unwrap().to_string(), "99.50");
    }

    #[test]
    fn test_bad_decimal_is_conversion_error() {
        assert!(matches!(
            parse_decimal("abc"),
            Err(rusqlite::Error::FromSqlConversionFailure(..))
        ));
    }
}
