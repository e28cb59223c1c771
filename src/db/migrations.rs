use crate::error::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub(super) fn apply_pending(conn: &mut Connection) -> AppResult<u32> {
    let current = current_version(conn)?;
    if current > CURRENT_SCHEMA_VERSION {
        return Err(AppError::Database(format!(
            "database schema version {current} is newer than supported version {CURRENT_SCHEMA_VERSION}"
        )));
    }
    let mut applied = 0;
    for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
        let tx = conn.transaction()?;
        apply_migration(&tx, version)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            params![version],
        )?;
        tx.commit()?;
        applied += 1;
    }
    Ok(applied)
}

pub(super) fn current_version(conn: &Connection) -> AppResult<u32> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations' LIMIT 1",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }

    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

fn apply_migration(tx: &Transaction<'_>, version: u32) -> AppResult<()> {
    match version {
        1 => tx.execute_batch(
            "
            CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                username TEXT UNIQUE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'customer'
                    CHECK (role IN ('admin', 'staff', 'customer')),
                is_active INTEGER NOT NULL DEFAULT 0,
                agreed_to_terms_at TEXT NULL,
                date_joined TEXT NOT NULL,
                last_login TEXT NULL
            );

            CREATE TABLE categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE menu_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                image TEXT NULL,
                is_available INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX idx_menu_items_category ON menu_items(category_id);

            CREATE TABLE variations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                menu_item_id INTEGER NOT NULL REFERENCES menu_items(id) ON DELETE CASCADE,
                size_name TEXT NOT NULL,
                price TEXT NOT NULL,
                stock_level INTEGER NOT NULL DEFAULT 0,
                is_available INTEGER NOT NULL DEFAULT 1,
                UNIQUE (menu_item_id, size_name)
            );

            CREATE TABLE orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
                order_number TEXT NOT NULL UNIQUE,
                processed_by_staff_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
                total_amount TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                order_type TEXT NOT NULL DEFAULT 'pre-selection',
                dining_method TEXT NOT NULL,
                amount_paid TEXT NULL,
                change_given TEXT NULL,
                table_number TEXT NULL,
                processed_at TEXT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX idx_orders_status ON orders(status, created_at);
            CREATE INDEX idx_orders_processed_at ON orders(processed_at);
            CREATE INDEX idx_orders_user ON orders(user_id, created_at DESC);

            CREATE TABLE order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                variation_id INTEGER NOT NULL REFERENCES variations(id) ON DELETE RESTRICT,
                quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0),
                price_at_order TEXT NOT NULL
            );
            CREATE INDEX idx_order_items_order ON order_items(order_id);
            CREATE INDEX idx_order_items_variation ON order_items(variation_id);

            CREATE TABLE feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                comment TEXT NOT NULL,
                sentiment_label TEXT NULL,
                sentiment_score REAL NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_type TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                total_sales_revenue TEXT NOT NULL DEFAULT '0.00',
                total_order_count INTEGER NOT NULL DEFAULT 0,
                online_order_count INTEGER NOT NULL DEFAULT 0,
                walkin_order_count INTEGER NOT NULL DEFAULT 0,
                avg_items_per_order REAL NOT NULL DEFAULT 0,
                dish_performance TEXT NOT NULL DEFAULT '[]',
                avg_hourly_orders TEXT NOT NULL DEFAULT '[]',
                recommendation TEXT NULL,
                recommendation_status TEXT NOT NULL DEFAULT 'pending',
                recommendation_updated_at TEXT NULL,
                generated_at TEXT NOT NULL,
                is_viewed INTEGER NOT NULL DEFAULT 0,
                UNIQUE (report_type, start_date, end_date)
            );
            CREATE INDEX idx_analytics_type_start ON analytics(report_type, start_date DESC);

            CREATE TABLE facial_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                encoding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?,
        _ => {
            return Err(AppError::Database(format!(
                "no migration for schema version {version}"
            )))
        }
    }
    Ok(())
}
