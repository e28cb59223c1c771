//! `/api/orders/` endpoints

use super::model::{CartLine, DiningMethod, OrderStatus, OrderType, SalesReportRow};
use super::store::{self, NewOrder, PaymentUpdate, QueueFilter};
use crate::clock;
use crate::db::codec::DATE_FORMAT;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::http::filters::{authenticated, json_body, query_map, staff, update_method, with_state};
use crate::http::pagination::Paginator;
use crate::http::reply;
use crate::http::state::AppState;
use crate::http::validate::{parse_decimal_value, Form};
use crate::observability::metrics::metrics;
use crate::users::model::User;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

const TABLE_NUMBER_MAX: usize = 10;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let create = warp::path!("api" / "orders" / "create")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(json_body())
        .then(create_order)
        .map(reply::render);

    let mine = warp::path!("api" / "orders" / "my-orders")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .and(query_map())
        .then(my_orders)
        .map(reply::render);

    let cancel = warp::path!("api" / "orders" / i64 / "cancel")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(authenticated(state.clone()))
        .then(cancel_order)
        .map(reply::render);

    let queue = warp::path!("api" / "orders" / "admin" / "all")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(query_map())
        .then(admin_queue)
        .map(reply::render);

    let update = warp::path!("api" / "orders" / "admin" / i64 / "update")
        .and(update_method())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(update_order)
        .map(reply::render);

    let pos = warp::path!("api" / "orders" / "admin" / "create-pos")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(create_pos_order)
        .map(reply::render);

    let sales = warp::path!("api" / "orders" / "admin" / "sales-report")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(query_map())
        .then(sales_report)
        .map(reply::render);

    let sales_all = warp::path!("api" / "orders" / "admin" / "sales-report" / "all")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state))
        .and(query_map())
        .then(sales_report_all)
        .map(reply::render);

    create
        .or(mine)
        .unify()
        .or(cancel)
        .unify()
        .or(queue)
        .unify()
        .or(update)
        .unify()
        .or(pos)
        .unify()
        .or(sales)
        .unify()
        .or(sales_all)
        .unify()
        .boxed()
}

fn invalid_choice(value: &str) -> String {
    format!("\"{value}\" is not a valid choice.")
}

fn parse_dining_method(form: &mut Form) -> Option<DiningMethod> {
    let raw = form.required_str("dining_method");
    if raw.is_empty() {
        return None;
    }
    let parsed = DiningMethod::parse(&raw);
    if parsed.is_none() {
        form.add_error("dining_method", invalid_choice(&raw));
    }
    parsed
}

/// Validate `[{variation_id, quantity}]`, collecting errors per line
fn parse_cart(raw: Option<Value>) -> Result<Vec<CartLine>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let entries = match raw {
        None => {
            errors.insert("items".to_string(), vec![crate::http::validate::REQUIRED.to_string()]);
            return Err(errors);
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            errors.insert("items".to_string(), vec!["Expected a list of items.".to_string()]);
            return Err(errors);
        }
    };

    let mut lines = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let mut form = match Form::new(entry) {
            Ok(form) => form,
            Err(_) => {
                errors.insert(
                    format!("items[{index}]"),
                    vec!["Invalid data. Expected a dictionary.".to_string()],
                );
                continue;
            }
        };
        let variation_id = form.required_i64("variation_id");
        let quantity = form.required_i64("quantity");
        if form.is_valid() && quantity < 1 {
            form.add_error("quantity", "Ensure this value is greater than or equal to 1.");
        }
        if form.is_valid() {
            lines.push(CartLine {
                variation_id,
                quantity,
            });
        } else {
            for (field, messages) in form.into_errors() {
                errors.insert(format!("items[{index}].{field}"), messages);
            }
        }
    }

    if errors.is_empty() {
        Ok(lines)
    } else {
        Err(errors)
    }
}

async fn create_order(state: AppState, user: User, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let dining_method = parse_dining_method(&mut form);
    let cart = parse_cart(form.take_raw("items"));
    let mut errors = form.into_errors();
    let cart = match cart {
        Ok(cart) => cart,
        Err(cart_errors) => {
            errors.extend(cart_errors);
            Vec::new()
        }
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let Some(dining_method) = dining_method else {
        return Err(AppError::field("dining_method", crate::http::validate::REQUIRED));
    };
    if cart.is_empty() {
        return Err(AppError::bad_request("Order must contain items."));
    }

    let (order_id, order_number) = state.db.write(|tx| {
        let lines = store::price_cart(tx, &cart, OrderType::PreSelection)?;
        let mut new = NewOrder {
            user_id: Some(user.id),
            processed_by_staff_id: None,
            order_number: String::new(),
            status: OrderStatus::Pending,
            order_type: OrderType::PreSelection,
            dining_method,
            amount_paid: None,
            change_given: None,
            table_number: None,
            processed_at: None,
            created_at: Utc::now(),
        };
        let order_id = store::insert_numbered_order(
            tx,
            &mut new,
            OrderType::PreSelection.prefix(),
            &mut rand::thread_rng(),
            &lines,
        )?;
        Ok((order_id, new.order_number))
    })?;

    metrics().online_order_created();
    info!(order_id, %order_number, user_id = user.id, "Online order placed");
    Ok(reply::created(&json!({
        "success": "Order created successfully!",
        "order_id": order_id,
    })))
}

async fn my_orders(
    state: AppState,
    user: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let paginator = Paginator::from_query("/api/orders/my-orders/", &query, &state.config.server)?;
    let page = state.db.read(|conn| {
        let count = store::count_user_orders(conn, user.id)?;
        paginator.paginate(count, |limit, offset| {
            store::list_user_orders(conn, user.id, limit, offset)
        })
    })?;
    Ok(reply::ok(&page))
}

async fn cancel_order(id: i64, state: AppState, user: User) -> AppResult<Response> {
    let order_number = state.db.write(|tx| {
        let order = store::find_order(tx, id)?
            .filter(|order| order.user.as_ref().is_some_and(|owner| owner.id == user.id))
            .ok_or_else(|| {
                AppError::not_found("Order not found or you do not have permission to cancel it.")
            })?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::bad_request(format!(
                "Cannot cancel an order with status '{}'.",
                order.status.as_str()
            )));
        }
        store::set_status(tx, order.id, OrderStatus::Cancelled, Utc::now())?;
        Ok(order.order_number)
    })?;

    metrics().order_cancelled();
    info!(order_id = id, "Order cancelled by customer");
    Ok(reply::ok(&json!({
        "success": format!("Order {order_number} has been cancelled."),
    })))
}

async fn admin_queue(
    state: AppState,
    _staff: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let status = query
        .get("status")
        .cloned()
        .unwrap_or_else(|| OrderStatus::Pending.as_str().to_string());
    let updated_between = (status == OrderStatus::Completed.as_str()).then(|| {
        let today = clock::today(state.offset());
        clock::local_days_utc_range(today, today, state.offset())
    });
    let search = query
        .get("search")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let filter = QueueFilter {
        status,
        updated_between,
        search,
    };
    let orders = state.db.read(|conn| store::list_queue(conn, &filter))?;
    Ok(reply::ok(&orders))
}

async fn update_order(
    id: i64,
    _partial: bool,
    state: AppState,
    staff: User,
    body: Value,
) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let raw_status = form.required_str("status");
    let status = OrderStatus::parse(&raw_status);
    if status.is_none() && !raw_status.is_empty() {
        form.add_error("status", invalid_choice(&raw_status));
    }
    let table_number = form.optional_text("table_number");
    if let Some(table_number) = &table_number {
        form.max_length("table_number", table_number, TABLE_NUMBER_MAX);
    }
    let payment = PaymentUpdate {
        table_number,
        amount_paid: form.optional_decimal("amount_paid"),
        change_given: form.optional_decimal("change_given"),
    };
    form.finish()?;
    let Some(status) = status else {
        return Err(AppError::field("status", crate::http::validate::REQUIRED));
    };

    let (order, units) = state.db.write(|tx| {
        let order = store::find_order(tx, id)?.ok_or(AppError::MissingObject)?;
        let now = Utc::now();
        let mut units = 0;
        if order.status == OrderStatus::Pending && status == OrderStatus::Processing {
            units = store::take_order_stock(tx, id)?;
            store::record_processing(tx, id, &payment, now)?;
        }
        store::set_status(tx, id, status, now)?;
        let updated = store::find_order(tx, id)?.ok_or(AppError::MissingObject)?;
        Ok((updated, units))
    })?;

    if units > 0 {
        metrics().stock_decremented(units);
    }
    info!(
        order_id = id,
        staff_id = staff.id,
        status = status.as_str(),
        "Order status updated"
    );
    Ok(reply::ok(&order))
}

/// Blank or missing amounts count as zero
fn payment_amount(raw: Option<&Value>) -> AppResult<Decimal> {
    match raw {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(Decimal::ZERO),
        Some(value) => parse_decimal_value(value)
            .ok_or_else(|| AppError::bad_request("Invalid payment amount provided.")),
    }
}

fn pos_cart(raw: Option<Value>) -> AppResult<Vec<CartLine>> {
    let entries = match raw {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err(AppError::bad_request("Order must contain items.")),
    };
    entries
        .iter()
        .map(|entry| {
            let variation_id = entry.get("variation_id").and_then(Value::as_i64);
            let quantity = entry.get("quantity").and_then(Value::as_i64);
            match (variation_id, quantity) {
                (Some(variation_id), Some(quantity)) if quantity >= 1 => Ok(CartLine {
                    variation_id,
                    quantity,
                }),
                (Some(_), Some(_)) => Err(AppError::bad_request(
                    "Item quantity must be at least 1.",
                )),
                _ => Err(AppError::bad_request("Invalid item ID in order.")),
            }
        })
        .collect()
}

async fn create_pos_order(state: AppState, staff: User, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let cart = pos_cart(form.take_raw("items"))?;

    let dining_method = match form.optional_text("dining_method").filter(|m| !m.is_empty()) {
        None => return Err(AppError::bad_request("Dining method is required.")),
        Some(raw) => DiningMethod::parse(&raw)
            .ok_or_else(|| AppError::field("dining_method", invalid_choice(&raw)))?,
    };
    let amount_paid = payment_amount(form.raw("amount_paid"))?;
    let change_given = payment_amount(form.raw("change_given"))?;
    let table_number = form.optional_text("table_number").filter(|t| !t.is_empty());
    if let Some(table_number) = &table_number {
        form.max_length("table_number", table_number, TABLE_NUMBER_MAX);
    }
    form.finish()?;

    let (order_id, order_number, units) = state.db.write(|tx| {
        let lines = store::price_cart(tx, &cart, OrderType::WalkIn)?;
        let now = Utc::now();
        let mut new = NewOrder {
            user_id: None,
            processed_by_staff_id: Some(staff.id),
            order_number: String::new(),
            status: OrderStatus::Processing,
            order_type: OrderType::WalkIn,
            dining_method,
            amount_paid: Some(amount_paid),
            change_given: Some(change_given),
            table_number: table_number.clone(),
            processed_at: Some(now),
            created_at: now,
        };
        let order_id = store::insert_numbered_order(
            tx,
            &mut new,
            OrderType::WalkIn.prefix(),
            &mut rand::thread_rng(),
            &lines,
        )?;
        let mut units = 0u64;
        for line in &lines {
            store::take_stock(tx, line.variation_id, line.quantity)?;
            units += line.quantity.unsigned_abs();
        }
        Ok((order_id, new.order_number, units))
    })?;

    metrics().pos_order_created();
    metrics().stock_decremented(units);
    info!(order_id, %order_number, staff_id = staff.id, "POS sale recorded");
    Ok(reply::created(&json!({
        "success": "POS Order created successfully!",
        "order_id": order_id,
    })))
}

/// `start_date`/`end_date` local days as a UTC range; both must parse
fn report_range(
    query: &HashMap<String, String>,
    state: &AppState,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let parse = |key: &str| {
        query
            .get(key)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok())
    };
    let (start, end) = (parse("start_date")?, parse("end_date")?);
    Some(clock::local_days_utc_range(start, end, state.offset()))
}

fn sales_rows(
    state: &AppState,
    query: &HashMap<String, String>,
) -> AppResult<Vec<SalesReportRow>> {
    let range = report_range(query, state);
    let orders = state.db.read(|conn| store::list_completed(conn, range))?;
    Ok(orders.into_iter().map(SalesReportRow::from).collect())
}

async fn sales_report(
    state: AppState,
    _staff: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let paginator =
        Paginator::from_query("/api/orders/admin/sales-report/", &query, &state.config.server)?;
    let rows = sales_rows(&state, &query)?;
    Ok(reply::ok(&paginator.paginate_vec(rows)?))
}

async fn sales_report_all(
    state: AppState,
    _staff: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    Ok(reply::ok(&sales_rows(&state, &query)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_errors_are_keyed_by_line() {
        let errors = parse_cart(Some(json!([
            {"variation_id": 1, "quantity": 2},
            {"variation_id": 2, "quantity": 0},
            {"quantity": 1}
        ])))
        .unwrap_err();
        assert!(errors.contains_key("items[1].quantity"));
        assert!(errors.contains_key("items[2].variation_id"));
        assert!(!errors.keys().any(|key| key.starts_with("items[0]")));
    }

    #[test]
    fn test_cart_requires_a_list() {
        assert!(parse_cart(None).unwrap_err().contains_key("items"));
        assert!(parse_cart(Some(json!("1,2"))).unwrap_err().contains_key("items"));
        assert_eq!(parse_cart(Some(json!([]))).unwrap(), vec![]);
    }

    #[test]
    fn test_payment_amounts() {
        assert_eq!(payment_amount(None).unwrap(), Decimal::ZERO);
        assert_eq!(payment_amount(Some(&json!(""))).unwrap(), Decimal::ZERO);
        assert_eq!(
            payment_amount(Some(&json!("500"))).unwrap(),
            Decimal::from(500)
        );
        assert_eq!(
            payment_amount(Some(&json!(250.5))).unwrap(),
            Decimal::new(2505, 1)
        );
        assert!(payment_amount(Some(&json!("five hundred"))).is_err());
    }

    #[test]
    fn test_pos_cart_messages() {
        assert_eq!(
            pos_cart(None).unwrap_err().to_string(),
            "Order must contain items."
        );
        assert_eq!(
            pos_cart(Some(json!([{"variation_id": "x", "quantity": 1}])))
                .unwrap_err()
                .to_string(),
            "Invalid item ID in order."
        );
        assert_eq!(pos_cart(Some(json!([{"variation_id": 4, "quantity": 2}]))).unwrap().len(), 1);
    }
}
