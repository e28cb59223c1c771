//! Reporting windows relative to the local "today"

use super::model::ReportType;
use chrono::{Datelike, Duration, NaiveDate};

/// Inclusive local-date window of the most recent complete period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub report_type: ReportType,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

/// Yesterday, last Monday-Sunday week, last calendar month, last calendar
/// year
pub fn period_for(report_type: ReportType, today: NaiveDate) -> Period {
    let (start, end) = match report_type {
        ReportType::Daily => {
            let yesterday = today - Duration::days(1);
            (yesterday, yesterday)
        }
        ReportType::Weekly => {
            let days_since_monday = i64::from(today.weekday().num_days_from_monday());
            let start = today - Duration::days(days_since_monday + 7);
            (start, start + Duration::days(6))
        }
        ReportType::Monthly => {
            let end = first_of_month(today) - Duration::days(1);
            (first_of_month(end), end)
        }
        ReportType::Yearly => {
            let end = first_of_year(today) - Duration::days(1);
            (first_of_year(end), end)
        }
    };
    Period {
        report_type,
        start,
        end,
    }
}

pub fn all_periods(today: NaiveDate) -> Vec<Period> {
    ReportType::ALL
        .iter()
        .map(|report_type| period_for(*report_type, today))
        .collect()
}
