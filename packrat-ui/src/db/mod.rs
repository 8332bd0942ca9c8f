//! Database access for packrat-ui
//!
//! Single shared SQLite database holding users, sessions and card records.
//! Schema is initialized idempotently at startup.

pub mod cards;
pub mod users;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to packrat.db in the root folder, creating it if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize packrat tables
///
/// Creates users, sessions and cards tables if they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_login TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            card_name TEXT NOT NULL,
            set_name TEXT NOT NULL DEFAULT '',
            set_code TEXT NOT NULL DEFAULT '',
            collector_number TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 1,
            is_foil INTEGER NOT NULL DEFAULT 0,
            condition TEXT NOT NULL DEFAULT 'Near Mint',
            language TEXT NOT NULL DEFAULT 'English',
            purchase_price REAL NOT NULL DEFAULT 0,
            current_price REAL NOT NULL DEFAULT 0,
            price_change REAL NOT NULL DEFAULT 0,
            total_value REAL NOT NULL DEFAULT 0,
            market_url TEXT,
            image_url TEXT,
            image_url_back TEXT,
            rarity TEXT NOT NULL DEFAULT '',
            colors TEXT NOT NULL DEFAULT '',
            mana_cost TEXT NOT NULL DEFAULT '',
            mana_value INTEGER NOT NULL DEFAULT 0,
            card_type TEXT NOT NULL DEFAULT '',
            price_alert_threshold REAL NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Covers both the owner-scoped list queries and the merge-pass name prefilter
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_user_name ON cards (user_id, card_name)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (users, sessions, cards)");

    Ok(())
}
