//! Order persistence and stock movements

use super::model::{
    new_order_number, CartLine, DiningMethod, Order, OrderItem, OrderStatus, OrderType,
    OrderVariation, PricedLine,
};
use crate::db::codec::{
    decimal_text, get_decimal, get_opt_decimal, get_opt_ts, get_ts, is_unique_violation,
    to_from_sql_error, ts,
};
use crate::error::{AppError, AppResult};
use crate::users::model::UserProfile;
use crate::users::store as users;
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// Fresh order numbers drawn before giving up on a clash
const ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// Columns of an order row before its lines and people are attached
struct OrderRow {
    id: i64,
    user_id: Option<i64>,
    processed_by_staff_id: Option<i64>,
    order_number: String,
    total_amount: Decimal,
    status: OrderStatus,
    order_type: OrderType,
    dining_method: DiningMethod,
    amount_paid: Option<Decimal>,
    change_given: Option<Decimal>,
    table_number: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.processed_by_staff_id, o.order_number, \
     o.total_amount, o.status, o.order_type, o.dining_method, o.amount_paid, o.change_given, \
     o.table_number, o.processed_at, o.created_at, o.updated_at";

fn unknown_value(kind: &str, value: &str) -> rusqlite::Error {
    to_from_sql_error(std::io::Error::other(format!("unknown {kind}: {value}")))
}

fn row_to_order(row: &Row<'_>) -> Result<OrderRow, rusqlite::Error> {
    let status: String = row.get("status")?;
    let order_type: String = row.get("order_type")?;
    let dining_method: String = row.get("dining_method")?;
    Ok(OrderRow {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        processed_by_staff_id: row.get("processed_by_staff_id")?,
        order_number: row.get("order_number")?,
        total_amount: get_decimal(row, "total_amount")?,
        status: OrderStatus::parse(&status).ok_or_else(|| unknown_value("status", &status))?,
        order_type: OrderType::parse(&order_type)
            .ok_or_else(|| unknown_value("order type", &order_type))?,
        dining_method: DiningMethod::parse(&dining_method)
            .ok_or_else(|| unknown_value("dining method", &dining_method))?,
        amount_paid: get_opt_decimal(row, "amount_paid")?,
        change_given: get_opt_decimal(row, "change_given")?,
        table_number: row.get("table_number")?,
        processed_at: get_opt_ts(row, "processed_at")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn order_lines(conn: &Connection, order_id: i64) -> AppResult<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT oi.id, oi.quantity, oi.price_at_order, v.id AS variation_id, v.size_name, \
         v.price, m.name AS menu_item_name, m.image AS menu_item_image \
         FROM order_items oi \
         JOIN variations v ON v.id = oi.variation_id \
         JOIN menu_items m ON m.id = v.menu_item_id \
         WHERE oi.order_id = ?1 ORDER BY oi.id",
    )?;
    let lines = stmt
        .query_map(params![order_id], |row| {
            Ok(OrderItem {
                id: row.get("id")?,
                variation: OrderVariation {
                    id: row.get("variation_id")?,
                    size_name: row.get("size_name")?,
                    price: get_decimal(row, "price")?,
                    menu_item_name: row.get("menu_item_name")?,
                    menu_item_image: row.get("menu_item_image")?,
                },
                quantity: row.get("quantity")?,
                price_at_order: get_decimal(row, "price_at_order")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Attach lines and user projections to bare rows
fn hydrate(conn: &Connection, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    let mut profiles: HashMap<i64, Option<UserProfile>> = HashMap::new();
    let mut profile = |id: Option<i64>| -> AppResult<Option<UserProfile>> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(cached) = profiles.get(&id) {
            return Ok(cached.clone());
        }
        let found = users::find_by_id(conn, id)?.map(|user| UserProfile::from(&user));
        profiles.insert(id, found.clone());
        Ok(found)
    };

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(Order {
            id: row.id,
            user: profile(row.user_id)?,
            processed_by_staff: profile(row.processed_by_staff_id)?,
            order_items: order_lines(conn, row.id)?,
            order_number: row.order_number,
            total_amount: row.total_amount,
            status: row.status,
            order_type: row.order_type,
            dining_method: row.dining_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
            processed_at: row.processed_at,
            table_number: row.table_number,
            amount_paid: row.amount_paid,
            change_given: row.change_given,
        });
    }
    Ok(orders)
}

fn query_orders(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> AppResult<Vec<Order>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, row_to_order)?
        .collect::<Result<Vec<_>, _>>()?;
    hydrate(conn, rows)
}

pub fn find_order(conn: &Connection, id: i64) -> AppResult<Option<Order>> {
    Ok(query_orders(
        conn,
        &format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1"),
        &[&id],
    )?
    .pop())
}

/// Resolve cart lines against current menu prices and stock. Nothing is
/// reserved; stock is taken later by [`take_stock`].
pub fn price_cart(conn: &Connection, lines: &[CartLine], origin: OrderType) -> AppResult<Vec<PricedLine>> {
    let mut stmt = conn.prepare(
        "SELECT v.price, v.stock_level, v.size_name, m.name FROM variations v \
         JOIN menu_items m ON m.id = v.menu_item_id WHERE v.id = ?1",
    )?;
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let found = stmt
            .query_row(params![line.variation_id], |row| {
                Ok((
                    get_decimal(row, "price")?,
                    row.get::<_, i64>("stock_level")?,
                    row.get::<_, String>("size_name")?,
                    row.get::<_, String>("name")?,
                ))
            })
            .optional()?;

        let Some((price, stock_level, size_name, item_name)) = found else {
            return Err(AppError::bad_request(match origin {
                OrderType::PreSelection => "Invalid item in cart.",
                OrderType::WalkIn => "Invalid item ID in order.",
            }));
        };

        if stock_level < line.quantity {
            return Err(AppError::bad_request(match origin {
                OrderType::PreSelection => format!(
                    "Not enough stock for {item_name} ({size_name}). Only {stock_level} left."
                ),
                OrderType::WalkIn => format!("Not enough stock for {item_name} ({size_name})."),
            }));
        }

        priced.push(PricedLine {
            variation_id: line.variation_id,
            quantity: line.quantity,
            price,
        });
    }
    Ok(priced)
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<i64>,
    pub processed_by_staff_id: Option<i64>,
    pub order_number: String,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub dining_method: DiningMethod,
    pub amount_paid: Option<Decimal>,
    pub change_given: Option<Decimal>,
    pub table_number: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert an order and its lines; the total is the sum of the lines
pub fn insert_order(conn: &Connection, new: &NewOrder, lines: &[PricedLine]) -> AppResult<i64> {
    let order_id = insert_order_row(conn, new, lines)?;
    insert_lines(conn, order_id, lines)?;
    Ok(order_id)
}

/// Insert an order under a random `{prefix}#XXXXXXXX` number, drawing a new
/// one while the number is already taken. The number used is left in
/// `new.order_number`.
pub fn insert_numbered_order<R: Rng + ?Sized>(
    conn: &Connection,
    new: &mut NewOrder,
    prefix: &str,
    rng: &mut R,
    lines: &[PricedLine],
) -> AppResult<i64> {
    for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
        new.order_number = new_order_number(prefix, rng);
        match insert_order_row(conn, new, lines) {
            Ok(order_id) => {
                insert_lines(conn, order_id, lines)?;
                return Ok(order_id);
            }
            Err(err) if is_unique_violation(&err) => {
                warn!(attempt, order_number = %new.order_number, "Order number already taken");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(AppError::internal(format!(
        "no free {prefix} order number after {ORDER_NUMBER_ATTEMPTS} attempts"
    )))
}

fn insert_order_row(
    conn: &Connection,
    new: &NewOrder,
    lines: &[PricedLine],
) -> Result<i64, rusqlite::Error> {
    let total = super::model::cart_total(lines);
    conn.execute(
        "INSERT INTO orders (user_id, processed_by_staff_id, order_number, total_amount, status, \
         order_type, dining_method, amount_paid, change_given, table_number, processed_at, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            new.user_id,
            new.processed_by_staff_id,
            new.order_number,
            decimal_text(total),
            new.status.as_str(),
            new.order_type.as_str(),
            new.dining_method.as_str(),
            new.amount_paid.map(decimal_text),
            new.change_given.map(decimal_text),
            new.table_number,
            new.processed_at.map(ts),
            ts(new.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_lines(conn: &Connection, order_id: i64, lines: &[PricedLine]) -> AppResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO order_items (order_id, variation_id, quantity, price_at_order) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for line in lines {
        stmt.execute(params![
            order_id,
            line.variation_id,
            line.quantity,
            decimal_text(line.price)
        ])?;
    }
    Ok(())
}

/// Decrement stock for one line, refusing to go below zero
pub fn take_stock(conn: &Connection, variation_id: i64, quantity: i64) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE variations SET stock_level = stock_level - ?2 \
         WHERE id = ?1 AND stock_level >= ?2",
        params![variation_id, quantity],
    )?;
    if changed == 0 {
        let item_name: String = conn
            .query_row(
                "SELECT m.name FROM variations v JOIN menu_items m ON m.id = v.menu_item_id \
                 WHERE v.id = ?1",
                params![variation_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_default();
        return Err(AppError::conflict(format!(
            "Stock for {item_name} is insufficient."
        )));
    }
    Ok(())
}

/// Take stock for every line of an order; returns units taken
pub fn take_order_stock(conn: &Connection, order_id: i64) -> AppResult<u64> {
    let mut stmt = conn.prepare(
        "SELECT variation_id, quantity FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let lines = stmt
        .query_map(params![order_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut units = 0u64;
    for (variation_id, quantity) in lines {
        take_stock(conn, variation_id, quantity)?;
        units += quantity.unsigned_abs();
    }
    Ok(units)
}

pub fn set_status(conn: &Connection, id: i64, status: OrderStatus, now: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), ts(now)],
    )?;
    Ok(())
}

/// Payment details captured when staff accept a pending order
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdate {
    pub table_number: Option<String>,
    pub amount_paid: Option<Decimal>,
    pub change_given: Option<Decimal>,
}

/// Stamp `processed_at` and record whichever payment fields were given
pub fn record_processing(
    conn: &Connection,
    id: i64,
    payment: &PaymentUpdate,
    now: DateTime<Utc>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE orders SET processed_at = ?2, \
         table_number = COALESCE(?3, table_number), \
         amount_paid = COALESCE(?4, amount_paid), \
         change_given = COALESCE(?5, change_given), \
         updated_at = ?2 WHERE id = ?1",
        params![
            id,
            ts(now),
            payment.table_number,
            payment.amount_paid.map(decimal_text),
            payment.change_given.map(decimal_text),
        ],
    )?;
    Ok(())
}

pub fn count_user_orders(conn: &Connection, user_id: i64) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?)
}

/// A customer's orders, newest first
pub fn list_user_orders(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> AppResult<Vec<Order>> {
    query_orders(
        conn,
        &format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = ?1 \
             ORDER BY o.created_at DESC, o.id DESC LIMIT ?2 OFFSET ?3"
        ),
        &[&user_id, &limit, &offset],
    )
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Kitchen queue filter
#[derive(Debug, Clone)]
pub struct QueueFilter {
    pub status: String,
    /// Only orders last updated inside this UTC range
    pub updated_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub search: Option<String>,
}

/// Pending orders oldest first, every other status most recently updated
/// first
pub fn list_queue(conn: &Connection, filter: &QueueFilter) -> AppResult<Vec<Order>> {
    let order_by = if filter.status == OrderStatus::Pending.as_str() {
        "o.created_at ASC, o.id ASC"
    } else {
        "o.updated_at DESC, o.id DESC"
    };
    let (from, until) = filter
        .updated_between
        .map(|(start, end)| (Some(ts(start)), Some(ts(end))))
        .unwrap_or((None, None));
    let pattern = filter.search.as_deref().map(like_pattern);

    query_orders(
        conn,
        &format!(
            "SELECT {ORDER_COLUMNS} FROM orders o LEFT JOIN users u ON u.id = o.user_id \
             WHERE o.status = ?1 \
             AND (?2 IS NULL OR o.updated_at >= ?2) AND (?3 IS NULL OR o.updated_at < ?3) \
             AND (?4 IS NULL OR o.order_number LIKE ?4 ESCAPE '\\' \
                  OR u.first_name LIKE ?4 ESCAPE '\\' OR u.last_name LIKE ?4 ESCAPE '\\') \
             ORDER BY {order_by}"
        ),
        &[&filter.status, &from, &until, &pattern],
    )
}

/// Completed orders, newest processed first, optionally limited to a UTC
/// range of `processed_at`
pub fn list_completed(
    conn: &Connection,
    processed_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> AppResult<Vec<Order>> {
    let (from, until) = processed_between
        .map(|(start, end)| (Some(ts(start)), Some(ts(end))))
        .unwrap_or((None, None));
    query_orders(
        conn,
        &format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.status = 'completed' \
             AND (?1 IS NULL OR o.processed_at >= ?1) AND (?2 IS NULL OR o.processed_at < ?2) \
             ORDER BY o.processed_at DESC, o.id DESC"
        ),
        &[&from, &until],
    )
}

/// Cancel pending orders created before `cutoff`
pub fn cancel_pending_before(conn: &Connection, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<u64> {
    let changed = conn.execute(
        "UPDATE orders SET status = 'cancelled', updated_at = ?2 \
         WHERE status = 'pending' AND created_at < ?1",
        params![ts(cutoff), ts(now)],
    )?;
    Ok(changed as u64)
}
