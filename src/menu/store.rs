use super::model::{Category, ItemChanges, MenuItem, Variation, VariationChanges};
use crate::db::codec::{decimal_text, get_decimal};
use crate::error::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

fn row_to_category(row: &Row<'_>) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn row_to_variation(row: &Row<'_>) -> Result<Variation, rusqlite::Error> {
    Ok(Variation {
        id: row.get("id")?,
        size_name: row.get("size_name")?,
        price: get_decimal(row, "price")?,
        stock_level: row.get("stock_level")?,
        is_available: row.get("is_available")?,
    })
}

pub fn list_categories(conn: &Connection) -> AppResult<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name, id")?;
    let categories = stmt
        .query_map([], row_to_category)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn find_category(conn: &Connection, id: i64) -> AppResult<Option<Category>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM categories WHERE id = ?1",
            params![id],
            row_to_category,
        )
        .optional()?)
}

fn category_name_taken(conn: &Connection, name: &str, except_id: Option<i64>) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE name = ?1 AND id != COALESCE(?2, -1)",
            params![name, except_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn duplicate_category() -> AppError {
    AppError::field("name", "categories with this name already exists.")
}

pub fn insert_category(conn: &Connection, name: &str) -> AppResult<Category> {
    if category_name_taken(conn, name, None)? {
        return Err(duplicate_category());
    }
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
    Ok(Category {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub fn rename_category(conn: &Connection, id: i64, name: &str) -> AppResult<()> {
    if category_name_taken(conn, name, Some(id))? {
        return Err(duplicate_category());
    }
    conn.execute(
        "UPDATE categories SET name = ?2 WHERE id = ?1",
        params![id, name],
    )?;
    Ok(())
}

/// Refuses while any menu item still points at the category
pub fn delete_category(conn: &Connection, id: i64) -> AppResult<()> {
    let items: i64 = conn.query_row(
        "SELECT COUNT(*) FROM menu_items WHERE category_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if items > 0 {
        return Err(AppError::bad_request(
            "Cannot delete category because it is being used by one or more menu items.",
        ));
    }
    conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(())
}

fn variations_by_item(conn: &Connection, item_id: Option<i64>) -> AppResult<HashMap<i64, Vec<Variation>>> {
    let mut stmt = conn.prepare(
        "SELECT id, menu_item_id, size_name, price, stock_level, is_available FROM variations \
         WHERE ?1 IS NULL OR menu_item_id = ?1 ORDER BY id",
    )?;
    let mut grouped: HashMap<i64, Vec<Variation>> = HashMap::new();
    let rows = stmt.query_map(params![item_id], |row| {
        Ok((row.get::<_, i64>("menu_item_id")?, row_to_variation(row)?))
    })?;
    for row in rows {
        let (menu_item_id, variation) = row?;
        grouped.entry(menu_item_id).or_default().push(variation);
    }
    Ok(grouped)
}

const ITEM_SELECT: &str = "SELECT m.id, m.name, m.image, m.is_available, \
     c.id AS category_id, c.name AS category_name \
     FROM menu_items m JOIN categories c ON c.id = m.category_id";

fn load_items(conn: &Connection, filter: &str, item_id: Option<i64>) -> AppResult<Vec<MenuItem>> {
    let mut variations = variations_by_item(conn, item_id)?;
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT} {filter} ORDER BY c.name, m.name, m.id"
    ))?;
    let rows = stmt
        .query_map(params![item_id], |row| {
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, String>("name")?,
                row.get::<_, Option<String>>("image")?,
                row.get::<_, bool>("is_available")?,
                Category {
                    id: row.get("category_id")?,
                    name: row.get("category_name")?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, name, image, is_available, category)| {
            let item_variations = variations.remove(&id).unwrap_or_default();
            MenuItem::new(id, name, image, is_available, category, item_variations)
        })
        .collect())
}

/// Every item, ordered by category name then item name
pub fn list_items(conn: &Connection) -> AppResult<Vec<MenuItem>> {
    load_items(conn, "WHERE ?1 IS NULL", None)
}

pub fn list_available_items(conn: &Connection) -> AppResult<Vec<MenuItem>> {
    load_items(conn, "WHERE ?1 IS NULL AND m.is_available = 1", None)
}

pub fn find_item(conn: &Connection, id: i64) -> AppResult<Option<MenuItem>> {
    Ok(load_items(conn, "WHERE m.id = ?1", Some(id))?.pop())
}

fn ensure_category(conn: &Connection, category_id: i64) -> AppResult<()> {
    if find_category(conn, category_id)?.is_none() {
        return Err(AppError::field(
            "category_id",
            format!("Invalid pk \"{category_id}\" - object does not exist."),
        ));
    }
    Ok(())
}

/// Insert an item; `changes` must carry name and category
pub fn insert_item(conn: &Connection, changes: &ItemChanges) -> AppResult<i64> {
    let (Some(name), Some(category_id)) = (&changes.name, changes.category_id) else {
        return Err(AppError::internal("menu item insert without name or category"));
    };
    ensure_category(conn, category_id)?;
    conn.execute(
        "INSERT INTO menu_items (category_id, name, image, is_available) VALUES (?1, ?2, ?3, ?4)",
        params![
            category_id,
            name,
            changes.image.clone().flatten(),
            changes.is_available.unwrap_or(true)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_item(conn: &Connection, id: i64, changes: &ItemChanges) -> AppResult<()> {
    if let Some(category_id) = changes.category_id {
        ensure_category(conn, category_id)?;
        conn.execute(
            "UPDATE menu_items SET category_id = ?2 WHERE id = ?1",
            params![id, category_id],
        )?;
    }
    if let Some(name) = &changes.name {
        conn.execute(
            "UPDATE menu_items SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
    }
    if let Some(image) = &changes.image {
        conn.execute(
            "UPDATE menu_items SET image = ?2 WHERE id = ?1",
            params![id, image],
        )?;
    }
    if let Some(is_available) = changes.is_available {
        conn.execute(
            "UPDATE menu_items SET is_available = ?2 WHERE id = ?1",
            params![id, is_available],
        )?;
    }
    Ok(())
}

/// Soft delete: the item and all of its sizes stop being sold
pub fn archive_item(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE menu_items SET is_available = 0 WHERE id = ?1",
        params![id],
    )?;
    conn.execute(
        "UPDATE variations SET is_available = 0 WHERE menu_item_id = ?1",
        params![id],
    )?;
    Ok(())
}

fn size_taken(conn: &Connection, item_id: i64, size_name: &str, except_id: Option<i64>) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM variations WHERE menu_item_id = ?1 AND size_name = ?2 \
             AND id != COALESCE(?3, -1)",
            params![item_id, size_name, except_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn duplicate_size() -> AppError {
    AppError::field(
        "variations",
        "The fields menu_item, size_name must make a unique set.",
    )
}

/// Insert a size; `changes` must carry size name and price
pub fn insert_variation(conn: &Connection, item_id: i64, changes: &VariationChanges) -> AppResult<i64> {
    let (Some(size_name), Some(price)) = (&changes.size_name, changes.price) else {
        return Err(AppError::internal("variation insert without size or price"));
    };
    if size_taken(conn, item_id, size_name, None)? {
        return Err(duplicate_size());
    }
    conn.execute(
        "INSERT INTO variations (menu_item_id, size_name, price, stock_level, is_available) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            item_id,
            size_name,
            decimal_text(price),
            changes.stock_level.unwrap_or(0),
            changes.is_available.unwrap_or(true)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Apply a partial update to a size of `item_id`; returns false when the
/// variation belongs to another item or does not exist
pub fn update_variation(conn: &Connection, item_id: i64, id: i64, changes: &VariationChanges) -> AppResult<bool> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT menu_item_id FROM variations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if owner != Some(item_id) {
        return Ok(false);
    }

    if let Some(size_name) = &changes.size_name {
        if size_taken(conn, item_id, size_name, Some(id))? {
            return Err(duplicate_size());
        }
        conn.execute(
            "UPDATE variations SET size_name = ?2 WHERE id = ?1",
            params![id, size_name],
        )?;
    }
    if let Some(price) = changes.price {
        conn.execute(
            "UPDATE variations SET price = ?2 WHERE id = ?1",
            params![id, decimal_text(price)],
        )?;
    }
    if let Some(stock_level) = changes.stock_level {
        conn.execute(
            "UPDATE variations SET stock_level = ?2 WHERE id = ?1",
            params![id, stock_level],
        )?;
    }
    if let Some(is_available) = changes.is_available {
        conn.execute(
            "UPDATE variations SET is_available = ?2 WHERE id = ?1",
            params![id, is_available],
        )?;
    }
    Ok(true)
}

pub fn variation_exists(conn: &Connection, id: i64) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM variations WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Hard delete, refused once the size appears on any order
pub fn delete_variation(conn: &Connection, id: i64) -> AppResult<()> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_items WHERE variation_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(AppError::bad_request(
            "Cannot delete: This variation is part of past sales records. \
             To hide it, please set its stock to 0 instead.",
        ));
    }
    conn.execute("DELETE FROM variations WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use rust_decimal::Decimal;

    fn item_changes(name: &str, category_id: i64) -> ItemChanges {
        ItemChanges {
            category_id: Some(category_id),
            name: Some(name.to_string()),
            ..ItemChanges::default()
        }
    }

    fn size(name: &str, cents: i64, stock: i64) -> VariationChanges {
        VariationChanges {
            size_name: Some(name.to_string()),
            price: Some(Decimal::new(cents, 2)),
            stock_level: Some(stock),
            ..VariationChanges::default()
        }
    }

    #[test]
    fn test_items_are_ordered_by_category_then_name() {
        let db = Database::in_memory().unwrap();
        db.write(|tx| {
            let mains = insert_category(tx, "Mains")?;
            let drinks = insert_category(tx, "Drinks")?;
            insert_item(tx, &item_changes("Sinigang", mains.id))?;
            insert_item(tx, &item_changes("Adobo", mains.id))?;
            insert_item(tx, &item_changes("Iced Tea", drinks.id))?;
            Ok(())
        })
        .unwrap();

        let names: Vec<String> = db
            .read(list_items)
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["Iced Tea", "Adobo", "Sinigang"]);
    }

    #[test]
    fn test_archive_hides_item_and_sizes() {
        let db = Database::in_memory().unwrap();
        let item_id = db
            .write(|tx| {
                let category = insert_category(tx, "Mains")?;
                let item_id = insert_item(tx, &item_changes("Adobo", category.id))?;
                insert_variation(tx, item_id, &size("Regular", 12000, 5))?;
                insert_variation(tx, item_id, &size("Large", 18000, 5))?;
                archive_item(tx, item_id)?;
                Ok(item_id)
            })
            .unwrap();

        let item = db.read(|conn| find_item(conn, item_id)).unwrap().unwrap();
        assert!(!item.is_available);
        assert!(item.variations.iter().all(|v| !v.is_available));
        assert!(item.is_fully_out_of_stock);
        assert!(db.read(list_available_items).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_names_are_field_errors() {
        let db = Database::in_memory().unwrap();
        let result = db.write(|tx| {
            let category = insert_category(tx, "Mains")?;
            let item_id = insert_item(tx, &item_changes("Adobo", category.id))?;
            insert_variation(tx, item_id, &size("Regular", 12000, 5))?;
            insert_variation(tx, item_id, &size("Regular", 15000, 5))
        });
        assert!(matches!(result, Err(AppError::Validation(_))));

        db.write(|tx| insert_category(tx, "Drinks")).unwrap();
        assert!(matches!(
            db.write(|tx| insert_category(tx, "Drinks")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let db = Database::in_memory().unwrap();
        let err = db
            .write(|tx| insert_item(tx, &item_changes("Adobo", 99)))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(errors) if errors.contains_key("category_id")));
    }

    #[test]
    fn test_category_in_use_cannot_be_deleted() {
        let db = Database::in_memory().unwrap();
        let category = db
            .write(|tx| {
                let category = insert_category(tx, "Mains")?;
                insert_item(tx, &item_changes("Adobo", category.id))?;
                Ok(category)
            })
            .unwrap();
        let err = db.write(|tx| delete_category(tx, category.id)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_update_variation_ignores_foreign_sizes() {
        let db = Database::in_memory().unwrap();
        let (first, second_size) = db
            .write(|tx| {
                let category = insert_category(tx, "Mains")?;
                let first = insert_item(tx, &item_changes("Adobo", category.id))?;
                let second = insert_item(tx, &item_changes("Sinigang", category.id))?;
                let second_size = insert_variation(tx, second, &size("Regular", 15000, 1))?;
                Ok((first, second_size))
            })
            .unwrap();

        let changes = VariationChanges {
            stock_level: Some(50),
            ..VariationChanges::default()
        };
        let updated = db
            .write(|tx| update_variation(tx, first, second_size, &changes))
            .unwrap();
        assert!(!updated);
    }
}
