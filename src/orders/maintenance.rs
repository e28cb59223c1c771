//! Batch jobs over the order table

use super::model::{DiningMethod, OrderStatus, OrderType, PricedLine};
use super::store::{self, NewOrder};
use crate::clock;
use crate::db::codec::get_decimal;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::observability::metrics::metrics;
use crate::users::model::Role;
use crate::users::store as users;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Cancel pending orders created more than `timeout` before `now`
pub fn cancel_stale_pending_orders(
    db: &Database,
    now: DateTime<Utc>,
    timeout: Duration,
) -> AppResult<u64> {
    let cutoff = now - timeout;
    let cancelled = db.write(|tx| store::cancel_pending_before(tx, cutoff, now))?;
    if cancelled > 0 {
        info!(cancelled, "Cancelled stale pending orders");
    } else {
        info!("No old pending orders to cancel");
    }
    metrics().stale_orders_cancelled(cancelled);
    Ok(cancelled)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub days: u32,
    pub orders: u32,
}

/// Generate completed-order history for every local day in
/// `[start, end]`. Sundays are mostly skipped. Lines reuse current menu
/// prices and do not touch stock.
pub fn seed_order_history<R: Rng + ?Sized>(
    db: &Database,
    start: NaiveDate,
    end: NaiveDate,
    offset: FixedOffset,
    rng: &mut R,
) -> AppResult<SeedSummary> {
    if end < start {
        return Err(AppError::bad_request("Seed end date is before the start date."));
    }

    db.write(|tx| {
        let customers = users::ids_by_role(tx, &[Role::Customer])?;
        let staff = users::ids_by_role(tx, &[Role::Staff, Role::Admin])?;
        let variations: Vec<(i64, Decimal)> = {
            let mut stmt = tx.prepare("SELECT id, price FROM variations WHERE is_available = 1")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>("id")?, get_decimal(row, "price")?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        if customers.is_empty() {
            return Err(AppError::bad_request(
                "No customers found. Please create customer users first.",
            ));
        }
        if variations.is_empty() {
            return Err(AppError::bad_request(
                "No menu variations found. Please create menu items and variations first.",
            ));
        }
        if staff.is_empty() {
            warn!("No staff members found; walk-in orders will not be assigned a processor");
        }

        let mut summary = SeedSummary::default();
        let mut day = start;
        while day <= end {
            if day.weekday() == Weekday::Sun && rng.gen_bool(0.9) {
                day += Duration::days(1);
                continue;
            }

            let count = rng.gen_range(20..=100);
            for _ in 0..count {
                let order_type = if rng.gen_bool(0.5) {
                    OrderType::PreSelection
                } else {
                    OrderType::WalkIn
                };
                let created_at = clock::local_to_utc(
                    day,
                    rng.gen_range(8..=22),
                    rng.gen_range(0..=59),
                    offset,
                ) + Duration::seconds(rng.gen_range(0..=59));

                let line_count = rng.gen_range(1..=5);
                let mut lines = Vec::with_capacity(line_count);
                for _ in 0..line_count {
                    let Some(&(variation_id, price)) = variations.choose(rng) else {
                        continue;
                    };
                    lines.push(PricedLine {
                        variation_id,
                        quantity: rng.gen_range(1..=3),
                        price,
                    });
                }

                let mut new = NewOrder {
                    user_id: match order_type {
                        OrderType::PreSelection => customers.choose(rng).copied(),
                        OrderType::WalkIn => None,
                    },
                    processed_by_staff_id: match order_type {
                        OrderType::PreSelection => None,
                        OrderType::WalkIn => staff.choose(rng).copied(),
                    },
                    order_number: String::new(),
                    status: OrderStatus::Completed,
                    order_type,
                    dining_method: if rng.gen_bool(0.5) {
                        DiningMethod::DineIn
                    } else {
                        DiningMethod::TakeOut
                    },
                    amount_paid: None,
                    change_given: None,
                    table_number: None,
                    processed_at: Some(created_at + Duration::minutes(rng.gen_range(5..=30))),
                    created_at,
                };
                store::insert_numbered_order(tx, &mut new, "SEED", rng, &lines)?;
                summary.orders += 1;
            }
            summary.days += 1;
            day += Duration::days(1);
        }

        info!(days = summary.days, orders = summary.orders, "Seeded order history");
        Ok(summary)
    })
}
