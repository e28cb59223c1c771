//! KPI rollups over completed orders

use super::model::{
    round2, DishSales, HourlyOrders, HourlyValue, ItemPerformance, KpiSnapshot, PerformanceReport,
    PerformanceSummary, ReportType,
};
use super::periods::{all_periods, Period};
use super::store;
use crate::clock;
use crate::db::codec::{get_decimal, get_ts, money, ts};
use crate::db::Database;
use crate::error::AppResult;
use crate::observability::metrics::metrics;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

const TOP_DISHES: usize = 10;

/// Header of a completed order inside a window
#[derive(Debug, Clone)]
pub struct CompletedOrder {
    pub online: bool,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One sold line inside a window
#[derive(Debug, Clone)]
pub struct SoldLine {
    pub item_name: String,
    pub size_name: String,
    pub quantity: i64,
    pub price_at_order: Decimal,
}

fn completed_orders(
    conn: &Connection,
    column: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> AppResult<Vec<CompletedOrder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT order_type, total_amount, created_at FROM orders \
         WHERE status = 'completed' AND {column} >= ?1 AND {column} < ?2"
    ))?;
    let rows = stmt
        .query_map(params![ts(from), ts(until)], |row| {
            Ok(CompletedOrder {
                online: row.get::<_, String>("order_type")? == "pre-selection",
                total_amount: get_decimal(row, "total_amount")?,
                created_at: get_ts(row, "created_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn sold_lines(
    conn: &Connection,
    column: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> AppResult<Vec<SoldLine>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT m.name AS item_name, v.size_name, oi.quantity, oi.price_at_order \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         JOIN variations v ON v.id = oi.variation_id \
         JOIN menu_items m ON m.id = v.menu_item_id \
         WHERE o.status = 'completed' AND o.{column} >= ?1 AND o.{column} < ?2"
    ))?;
    let rows = stmt
        .query_map(params![ts(from), ts(until)], |row| {
            Ok(SoldLine {
                item_name: row.get("item_name")?,
                size_name: row.get("size_name")?,
                quantity: row.get("quantity")?,
                price_at_order: get_decimal(row, "price_at_order")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fold a window's orders and lines into KPI figures
pub fn summarize(
    period: &Period,
    orders: &[CompletedOrder],
    lines: &[SoldLine],
    offset: FixedOffset,
) -> KpiSnapshot {
    if orders.is_empty() {
        return KpiSnapshot::default();
    }

    let total_order_count = orders.len() as i64;
    let online_order_count = orders.iter().filter(|order| order.online).count() as i64;
    let total_sales_revenue = money(orders.iter().map(|order| order.total_amount).sum());
    let items_sold: i64 = lines.iter().map(|line| line.quantity).sum();

    let mut by_dish: HashMap<&str, i64> = HashMap::new();
    for line in lines {
        *by_dish.entry(line.item_name.as_str()).or_default() += line.quantity;
    }
    let mut dish_performance: Vec<DishSales> = by_dish
        .into_iter()
        .map(|(dish_name, sold)| DishSales {
            dish_name: dish_name.to_string(),
            sold,
        })
        .collect();
    dish_performance.sort_by(|a, b| b.sold.cmp(&a.sold).then_with(|| a.dish_name.cmp(&b.dish_name)));
    dish_performance.truncate(TOP_DISHES);

    let mut hourly = [0u64; 24];
    for order in orders {
        hourly[clock::local_hour(order.created_at, offset) as usize] += 1;
    }
    let days = period.days().max(1) as f64;
    let avg_hourly_orders = hourly
        .iter()
        .enumerate()
        .map(|(hour, count)| HourlyOrders {
            hour: hour as u32,
            orders: match period.report_type {
                ReportType::Daily => HourlyValue::Count(*count),
                _ => HourlyValue::Average(round2(*count as f64 / days)),
            },
        })
        .collect();

    KpiSnapshot {
        total_sales_revenue,
        total_order_count,
        online_order_count,
        walkin_order_count: total_order_count - online_order_count,
        avg_items_per_order: round2(items_sold as f64 / total_order_count as f64),
        dish_performance,
        avg_hourly_orders,
    }
}

/// Compute the snapshot for orders created on the window's local days
pub fn snapshot_for(conn: &Connection, period: &Period, offset: FixedOffset) -> AppResult<KpiSnapshot> {
    let (from, until) = clock::local_days_utc_range(period.start, period.end, offset);
    let orders = completed_orders(conn, "created_at", from, until)?;
    let lines = sold_lines(conn, "created_at", from, until)?;
    Ok(summarize(period, &orders, &lines, offset))
}

/// Nightly job: recompute and upsert every report type for `today`
pub fn generate_reports(
    db: &Database,
    today: NaiveDate,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> AppResult<Vec<Period>> {
    let periods = all_periods(today);
    for period in &periods {
        let snapshot = db.read(|conn| snapshot_for(conn, period, offset))?;
        if snapshot.total_order_count == 0 {
            info!(
                report_type = period.report_type.as_str(),
                start = %period.start,
                end = %period.end,
                "No completed orders in period; writing empty snapshot"
            );
        }
        db.write(|tx| store::upsert_snapshot(tx, period, &snapshot, now))?;
        metrics().analytics_report_written();
        info!(
            report_type = period.report_type.as_str(),
            start = %period.start,
            end = %period.end,
            orders = snapshot.total_order_count,
            "Analytics report written"
        );
    }
    Ok(periods)
}

/// Pure fold behind the performance report
pub fn summarize_performance(orders: &[CompletedOrder], lines: &[SoldLine]) -> PerformanceReport {
    let total_orders = orders.len() as i64;
    let total_revenue = money(orders.iter().map(|order| order.total_amount).sum());
    let total_items_sold = lines.iter().map(|line| line.quantity).sum();
    let average_order_value = if total_orders > 0 {
        money(total_revenue / Decimal::from(total_orders))
    } else {
        money(Decimal::ZERO)
    };

    struct Acc {
        units: i64,
        revenue: Decimal,
        price_sum: Decimal,
        lines: i64,
    }
    let mut grouped: HashMap<(&str, &str), Acc> = HashMap::new();
    for line in lines {
        let acc = grouped
            .entry((line.item_name.as_str(), line.size_name.as_str()))
            .or_insert(Acc {
                units: 0,
                revenue: Decimal::ZERO,
                price_sum: Decimal::ZERO,
                lines: 0,
            });
        acc.units += line.quantity;
        acc.revenue += line.price_at_order * Decimal::from(line.quantity);
        acc.price_sum += line.price_at_order;
        acc.lines += 1;
    }

    let mut item_performance: Vec<ItemPerformance> = grouped
        .into_iter()
        .map(|((item_name, variation_name), acc)| ItemPerformance {
            item_name: item_name.to_string(),
            variation_name: variation_name.to_string(),
            units_sold: acc.units,
            total_revenue: money(acc.revenue),
            average_price: money(acc.price_sum / Decimal::from(acc.lines.max(1))),
        })
        .collect();
    item_performance.sort_by(|a, b| {
        b.total_revenue
            .cmp(&a.total_revenue)
            .then_with(|| a.item_name.cmp(&b.item_name))
            .then_with(|| a.variation_name.cmp(&b.variation_name))
    });

    PerformanceReport {
        summary: PerformanceSummary {
            total_revenue,
            total_orders,
            total_items_sold,
            average_order_value,
        },
        item_performance,
    }
}

/// Completed orders whose local processed date lies in `[start, end]`
pub fn performance_report(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
) -> AppResult<PerformanceReport> {
    let (from, until) = clock::local_days_utc_range(start, end, offset);
    let orders = completed_orders(conn, "processed_at", from, until)?;
    let lines = sold_lines(conn, "processed_at", from, until)?;
    Ok(summarize_performance(&orders, &lines))
}
