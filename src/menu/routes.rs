//! `/api/menu/` endpoints

use super::model::{Category, ItemChanges, StockFilter, VariationChanges};
use super::store;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::http::filters::{json_body, query_map, staff, update_method, with_state};
use crate::http::pagination::Paginator;
use crate::http::reply;
use crate::http::state::AppState;
use crate::http::validate::Form;
use crate::users::model::User;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

const NAME_MAX: usize = 150;
const CATEGORY_NAME_MAX: usize = 100;
const SIZE_NAME_MAX: usize = 100;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let items = warp::path!("api" / "menu" / "items")
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(list_items)
        .map(reply::render);

    let categories = warp::path!("api" / "menu" / "categories")
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(list_categories)
        .map(reply::render);

    let admin_items = warp::path!("api" / "menu" / "admin" / "items")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(query_map())
        .then(admin_list_items)
        .map(reply::render);

    let admin_create_item = warp::path!("api" / "menu" / "admin" / "items")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(create_item)
        .map(reply::render);

    let admin_get_item = warp::path!("api" / "menu" / "admin" / "items" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .then(get_item)
        .map(reply::render);

    let admin_update_item = warp::path!("api" / "menu" / "admin" / "items" / i64)
        .and(update_method())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(update_item)
        .map(reply::render);

    let admin_archive_item = warp::path!("api" / "menu" / "admin" / "items" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .then(archive_item)
        .map(reply::render);

    let admin_delete_variation = warp::path!("api" / "menu" / "admin" / "variations" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .then(delete_variation)
        .map(reply::render);

    let admin_categories = warp::path!("api" / "menu" / "admin" / "categories")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .then(admin_list_categories)
        .map(reply::render);

    let admin_create_category = warp::path!("api" / "menu" / "admin" / "categories")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(create_category)
        .map(reply::render);

    let admin_get_category = warp::path!("api" / "menu" / "admin" / "categories" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .then(get_category)
        .map(reply::render);

    let admin_update_category = warp::path!("api" / "menu" / "admin" / "categories" / i64)
        .and(update_method())
        .and(with_state(state.clone()))
        .and(staff(state.clone()))
        .and(json_body())
        .then(update_category)
        .map(reply::render);

    let admin_delete_category = warp::path!("api" / "menu" / "admin" / "categories" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(staff(state))
        .then(delete_category)
        .map(reply::render);

    items
        .or(categories)
        .unify()
        .or(admin_items)
        .unify()
        .or(admin_create_item)
        .unify()
        .or(admin_get_item)
        .unify()
        .or(admin_update_item)
        .unify()
        .or(admin_archive_item)
        .unify()
        .or(admin_delete_variation)
        .unify()
        .or(admin_categories)
        .unify()
        .or(admin_create_category)
        .unify()
        .or(admin_get_category)
        .unify()
        .or(admin_update_category)
        .unify()
        .or(admin_delete_category)
        .unify()
        .boxed()
}

fn validate_price(form: &mut Form, field: &str, price: Decimal) {
    if price.scale() > 2 && price.normalize().scale() > 2 {
        form.add_error(field, "Ensure that there are no more than 2 decimal places.");
    }
    if price < Decimal::ZERO {
        form.add_error(field, "Ensure this value is greater than or equal to 0.");
    }
    if price.trunc().abs() >= Decimal::from(100_000_000) {
        form.add_error(
            field,
            "Ensure that there are no more than 8 digits before the decimal point.",
        );
    }
}

/// Validate one entry of a `variations` array. New sizes (no `id`) need a
/// name and a price.
fn parse_variation(value: Value, require_all: bool) -> Result<VariationChanges, FieldErrors> {
    let mut form = Form::new(value).map_err(|err| match err {
        AppError::Validation(errors) => errors,
        other => FieldErrors::from([("non_field_errors".to_string(), vec![other.to_string()])]),
    })?;

    let id = form.optional_i64("id");
    let require_all = require_all || id.is_none();

    let size_name = if require_all {
        Some(form.required_str("size_name"))
    } else {
        form.optional_str("size_name")
    };
    if let Some(size_name) = &size_name {
        form.max_length("size_name", size_name, SIZE_NAME_MAX);
    }

    let price = if require_all && !form.has("price") {
        form.add_error("price", crate::http::validate::REQUIRED);
        None
    } else {
        form.optional_decimal("price")
    };
    if let Some(price) = price {
        validate_price(&mut form, "price", price);
    }

    let stock_level = form.optional_i64("stock_level");
    let is_available = form.optional_bool("is_available");

    if form.is_valid() {
        Ok(VariationChanges {
            id,
            size_name,
            price,
            stock_level,
            is_available,
        })
    } else {
        Err(form.into_errors())
    }
}

/// Accepts a JSON array or a string holding one, as multipart clients send
fn parse_variations(raw: Option<Value>, require_all: bool) -> AppResult<Vec<VariationChanges>> {
    let raw = match raw {
        None => return Ok(Vec::new()),
        Some(Value::String(text)) => serde_json::from_str::<Value>(&text)
            .map_err(|_| AppError::field("variations", "Invalid JSON format."))?,
        Some(other) => other,
    };
    let Value::Array(entries) = raw else {
        return Err(AppError::field(
            "variations",
            "Expected a list of items.",
        ));
    };

    let mut errors = FieldErrors::new();
    let mut parsed = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match parse_variation(entry, require_all) {
            Ok(changes) => parsed.push(changes),
            Err(entry_errors) => {
                for (field, messages) in entry_errors {
                    errors.insert(format!("variations[{index}].{field}"), messages);
                }
            }
        }
    }
    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(AppError::Validation(errors))
    }
}

fn parse_item(form: &mut Form, partial: bool) -> ItemChanges {
    let name = if partial {
        form.optional_str("name")
    } else {
        Some(form.required_str("name"))
    };
    if let Some(name) = &name {
        form.max_length("name", name, NAME_MAX);
    }
    let category_id = if partial {
        form.optional_i64("category_id")
    } else {
        Some(form.required_i64("category_id"))
    };
    let image = if form.is_null("image") {
        Some(None)
    } else {
        form.optional_text("image")
            .map(|image| (!image.is_empty()).then_some(image))
    };
    let is_available = form.optional_bool("is_available");
    ItemChanges {
        category_id,
        name,
        image,
        is_available,
    }
}

async fn list_items(state: AppState) -> AppResult<Response> {
    let items = state.db.read(store::list_available_items)?;
    Ok(reply::ok(&items))
}

async fn list_categories(state: AppState) -> AppResult<Response> {
    let categories = state.db.read(store::list_categories)?;
    Ok(reply::ok(&categories))
}

async fn admin_list_items(
    state: AppState,
    _staff: User,
    query: HashMap<String, String>,
) -> AppResult<Response> {
    let paginator = Paginator::from_query("/api/menu/admin/items/", &query, &state.config.server)?;
    let filter = StockFilter::parse(query.get("status").map(String::as_str));
    let items: Vec<_> = state
        .db
        .read(store::list_items)?
        .into_iter()
        .filter(|item| filter.matches(item))
        .collect();
    Ok(reply::ok(&paginator.paginate_vec(items)?))
}

async fn create_item(state: AppState, _staff: User, body: Value) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let changes = parse_item(&mut form, false);
    let raw_variations = form
        .take_raw("variations")
        .or_else(|| form.take_raw("variations_data"));
    form.finish()?;
    let variations = parse_variations(raw_variations, true)?;

    let item = state.db.write(|tx| {
        let item_id = store::insert_item(tx, &changes)?;
        for variation in &variations {
            store::insert_variation(tx, item_id, variation)?;
        }
        store::find_item(tx, item_id)?.ok_or(AppError::MissingObject)
    })?;
    info!(item_id = item.id, variations = item.variations.len(), "Menu item created");
    Ok(reply::created(&item))
}

async fn get_item(id: i64, state: AppState, _staff: User) -> AppResult<Response> {
    let item = state
        .db
        .read(|conn| store::find_item(conn, id))?
        .ok_or(AppError::MissingObject)?;
    Ok(reply::ok(&item))
}

/// Item fields are always applied partially, PUT included
async fn update_item(
    id: i64,
    _partial: bool,
    state: AppState,
    _staff: User,
    body: Value,
) -> AppResult<Response> {
    let mut form = Form::new(body)?;
    let changes = parse_item(&mut form, true);
    let raw_variations = form.take_raw("variations");
    form.finish()?;
    let variations = parse_variations(raw_variations, false)?;

    let item = state.db.write(|tx| {
        if store::find_item(tx, id)?.is_none() {
            return Err(AppError::MissingObject);
        }
        store::update_item(tx, id, &changes)?;
        for variation in &variations {
            match variation.id {
                Some(variation_id) => {
                    store::update_variation(tx, id, variation_id, variation)?;
                }
                None => {
                    store::insert_variation(tx, id, variation)?;
                }
            }
        }
        store::find_item(tx, id)?.ok_or(AppError::MissingObject)
    })?;
    Ok(reply::ok(&item))
}

async fn archive_item(id: i64, state: AppState, _staff: User) -> AppResult<Response> {
    state.db.write(|tx| {
        if store::find_item(tx, id)?.is_none() {
            return Err(AppError::MissingObject);
        }
        store::archive_item(tx, id)
    })?;
    info!(item_id = id, "Menu item archived");
    Ok(reply::no_content())
}

async fn delete_variation(id: i64, state: AppState, _staff: User) -> AppResult<Response> {
    state.db.write(|tx| {
        if !store::variation_exists(tx, id)? {
            return Err(AppError::MissingObject);
        }
        store::delete_variation(tx, id)
    })?;
    Ok(reply::no_content())
}

async fn admin_list_categories(state: AppState, _staff: User) -> AppResult<Response> {
    list_categories(state).await
}

fn category_name(body: Value, partial: bool) -> AppResult<Option<String>> {
    let mut form = Form::new(body)?;
    let name = if partial {
        form.optional_str("name")
    } else {
        Some(form.required_str("name"))
    };
    if let Some(name) = &name {
        form.max_length("name", name, CATEGORY_NAME_MAX);
    }
    form.finish()?;
    Ok(name)
}

async fn create_category(state: AppState, _staff: User, body: Value) -> AppResult<Response> {
    let name = category_name(body, false)?.unwrap_or_default();
    let category = state.db.write(|tx| store::insert_category(tx, &name))?;
    Ok(reply::created(&category))
}

fn load_category(state: &AppState, id: i64) -> AppResult<Category> {
    state
        .db
        .read(|conn| store::find_category(conn, id))?
        .ok_or(AppError::MissingObject)
}

async fn get_category(id: i64, state: AppState, _staff: User) -> AppResult<Response> {
    Ok(reply::ok(&load_category(&state, id)?))
}

async fn update_category(
    id: i64,
    partial: bool,
    state: AppState,
    _staff: User,
    body: Value,
) -> AppResult<Response> {
    let category = load_category(&state, id)?;
    let name = category_name(body, partial)?.unwrap_or(category.name);
    state.db.write(|tx| store::rename_category(tx, id, &name))?;
    Ok(reply::ok(&Category { id, name }))
}

async fn delete_category(id: i64, state: AppState, _staff: User) -> AppResult<Response> {
    load_category(&state, id)?;
    state.db.write(|tx| store::delete_category(tx, id))?;
    Ok(reply::no_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variations_accept_json_string() {
        let raw = json!(r#"[{"size_name": "Regular", "price": "120.00", "stock_level": 10}]"#);
        let parsed = parse_variations(Some(raw), true).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].size_name.as_deref(), Some("Regular"));
        assert_eq!(parsed[0].price, Some(Decimal::new(12000, 2)));
    }

    #[test]
    fn test_bad_variation_names_its_index() {
        let raw = json!([
            {"size_name": "Regular", "price": 120},
            {"size_name": "Large", "price": "abc"}
        ]);
        let err = parse_variations(Some(raw), true).unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.contains_key("variations[1].price"));
                assert!(!errors.contains_key("variations[0].price"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_existing_variation_update_may_be_partial() {
        let raw = json!([{"id": 4, "stock_level": 12}]);
        let parsed = parse_variations(Some(raw), false).unwrap();
        assert_eq!(parsed[0].id, Some(4));
        assert_eq!(parsed[0].price, None);

        let raw = json!([{"stock_level": 12}]);
        assert!(parse_variations(Some(raw), false).is_err());
    }

    #[test]
    fn test_price_precision() {
        let raw = json!([{"size_name": "Regular", "price": "1.005"}]);
        assert!(parse_variations(Some(raw), true).is_err());
        let raw = json!([{"size_name": "Regular", "price": "-1"}]);
        assert!(parse_variations(Some(raw), true).is_err());
        let raw = json!([{"size_name": "Regular", "price": "1.50"}]);
        assert!(parse_variations(Some(raw), true).is_ok());
    }

    #[test]
    fn test_invalid_json_string_is_rejected() {
        let err = parse_variations(Some(json!("[{oops")), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(errors) if errors.contains_key("variations")));
    }
}
