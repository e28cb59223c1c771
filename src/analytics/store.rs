//! Snapshot persistence

use super::model::{AnalyticsReport, KpiSnapshot, RecommendationStatus, ReportType};
use super::periods::Period;
use crate::db::codec::{
    date_str, decimal_text, get_date, get_decimal, get_opt_ts, get_ts, to_from_sql_error, ts,
};
use crate::error::AppResult;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REPORT_COLUMNS: &str = "id, report_type, start_date, end_date, total_sales_revenue, \
     total_order_count, online_order_count, walkin_order_count, avg_items_per_order, \
     dish_performance, avg_hourly_orders, recommendation, recommendation_status, \
     recommendation_updated_at, is_viewed, generated_at";

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: &str) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(to_from_sql_error)
}

fn row_to_report(row: &Row<'_>) -> Result<AnalyticsReport, rusqlite::Error> {
    let report_type: String = row.get("report_type")?;
    let status: String = row.get("recommendation_status")?;
    let recommendation_status = RecommendationStatus::parse(&status).unwrap_or_default();
    Ok(AnalyticsReport {
        id: row.get("id")?,
        report_type: ReportType::parse(&report_type).ok_or_else(|| {
            to_from_sql_error(std::io::Error::other(format!(
                "unknown report type: {report_type}"
            )))
        })?,
        start_date: get_date(row, "start_date")?,
        end_date: get_date(row, "end_date")?,
        total_sales_revenue: get_decimal(row, "total_sales_revenue")?,
        total_order_count: row.get("total_order_count")?,
        online_order_count: row.get("online_order_count")?,
        walkin_order_count: row.get("walkin_order_count")?,
        avg_items_per_order: row.get("avg_items_per_order")?,
        dish_performance: json_column(row, "dish_performance")?,
        avg_hourly_orders: json_column(row, "avg_hourly_orders")?,
        recommendation: row.get("recommendation")?,
        recommendation_status,
        recommendation_status_display: recommendation_status.display(),
        recommendation_updated_at: get_opt_ts(row, "recommendation_updated_at")?,
        is_viewed: row.get("is_viewed")?,
        generated_at: get_ts(row, "generated_at")?,
    })
}

fn serialize<T: serde::Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value)
        .map_err(|e| crate::error::AppError::internal(format!("snapshot encoding failed: {e}")))
}

/// Insert or refresh the figures of a window. Recommendation fields of an
/// existing row are left alone.
pub fn upsert_snapshot(
    conn: &Connection,
    period: &Period,
    snapshot: &KpiSnapshot,
    now: DateTime<Utc>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO analytics (report_type, start_date, end_date, total_sales_revenue, \
         total_order_count, online_order_count, walkin_order_count, avg_items_per_order, \
         dish_performance, avg_hourly_orders, generated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         ON CONFLICT(report_type, start_date, end_date) DO UPDATE SET \
         total_sales_revenue = excluded.total_sales_revenue, \
         total_order_count = excluded.total_order_count, \
         online_order_count = excluded.online_order_count, \
         walkin_order_count = excluded.walkin_order_count, \
         avg_items_per_order = excluded.avg_items_per_order, \
         dish_performance = excluded.dish_performance, \
         avg_hourly_orders = excluded.avg_hourly_orders, \
         generated_at = excluded.generated_at",
        params![
            period.report_type.as_str(),
            date_str(period.start),
            date_str(period.end),
            decimal_text(snapshot.total_sales_revenue),
            snapshot.total_order_count,
            snapshot.online_order_count,
            snapshot.walkin_order_count,
            snapshot.avg_items_per_order,
            serialize(&snapshot.dish_performance)?,
            serialize(&snapshot.avg_hourly_orders)?,
            ts(now),
        ],
    )?;
    Ok(())
}

pub fn find_report(conn: &Connection, id: i64) -> AppResult<Option<AnalyticsReport>> {
    Ok(conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM analytics WHERE id = ?1"),
            params![id],
            row_to_report,
        )
        .optional()?)
}

/// Most recent window of a type, by start date
pub fn latest_by_type(conn: &Connection, report_type: ReportType) -> AppResult<Option<AnalyticsReport>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM analytics WHERE report_type = ?1 \
                 ORDER BY start_date DESC LIMIT 1"
            ),
            params![report_type.as_str()],
            row_to_report,
        )
        .optional()?)
}

pub fn latest_weekly_with_recommendation(conn: &Connection) -> AppResult<Option<AnalyticsReport>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM analytics WHERE report_type = 'weekly' \
                 AND recommendation IS NOT NULL ORDER BY start_date DESC LIMIT 1"
            ),
            [],
            row_to_report,
        )
        .optional()?)
}

pub fn latest_weekly_without_recommendation(conn: &Connection) -> AppResult<Option<AnalyticsReport>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM analytics WHERE report_type = 'weekly' \
                 AND recommendation IS NULL ORDER BY start_date DESC LIMIT 1"
            ),
            [],
            row_to_report,
        )
        .optional()?)
}

/// The weekly window immediately preceding `start`
pub fn previous_weekly(conn: &Connection, start: NaiveDate) -> AppResult<Option<AnalyticsReport>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM analytics WHERE report_type = 'weekly' \
                 AND start_date < ?1 ORDER BY start_date DESC LIMIT 1"
            ),
            params![date_str(start)],
            row_to_report,
        )
        .optional()?)
}

pub fn mark_viewed(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE analytics SET is_viewed = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Returns false when no report has this id
pub fn set_recommendation_status(
    conn: &Connection,
    id: i64,
    status: RecommendationStatus,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE analytics SET recommendation_status = ?2, recommendation_updated_at = ?3 \
         WHERE id = ?1",
        params![id, status.as_str(), ts(now)],
    )?;
    Ok(changed > 0)
}

pub fn store_recommendation(conn: &Connection, id: i64, text: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE analytics SET recommendation = ?2 WHERE id = ?1",
        params![id, text],
    )?;
    Ok(())
}
