//! Card record store
//!
//! All inventory mutations go through this module. Records are queried by
//! owner plus filter predicate; sort keys are validated against an
//! allow-list before being spliced into SQL.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::{CardFilter, CardRecord, CollectionStats, FilterOptions, NewCard};

/// Sort keys accepted by the list query
const VALID_SORTS: &[&str] = &[
    "card_name",
    "set_name",
    "current_price",
    "total_value",
    "quantity",
    "mana_value",
];

/// Default page size for the dashboard listing
pub const PAGE_SIZE: i64 = 50;

fn card_from_row(row: &SqliteRow) -> Result<CardRecord> {
    let last_updated_str: String = row.get("last_updated");
    let last_updated = DateTime::parse_from_rfc3339(&last_updated_str)?.with_timezone(&Utc);

    Ok(CardRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        card_name: row.get("card_name"),
        set_name: row.get("set_name"),
        set_code: row.get("set_code"),
        collector_number: row.get("collector_number"),
        quantity: row.get("quantity"),
        is_foil: row.get("is_foil"),
        condition: row.get("condition"),
        language: row.get("language"),
        purchase_price: row.get("purchase_price"),
        current_price: row.get("current_price"),
        price_change: row.get("price_change"),
        total_value: row.get("total_value"),
        market_url: row.get("market_url"),
        image_url: row.get("image_url"),
        image_url_back: row.get("image_url_back"),
        rarity: row.get("rarity"),
        colors: row.get("colors"),
        mana_cost: row.get("mana_cost"),
        mana_value: row.get("mana_value"),
        card_type: row.get("card_type"),
        price_alert_threshold: row.get("price_alert_threshold"),
        last_updated,
    })
}

/// Append the shared WHERE clauses for a filter predicate
fn push_filter_clauses(qb: &mut QueryBuilder<Sqlite>, filter: &CardFilter) {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (LOWER(card_name) LIKE LOWER(")
            .push_bind(pattern.clone())
            .push(") OR LOWER(set_name) LIKE LOWER(")
            .push_bind(pattern.clone())
            .push(") OR LOWER(card_type) LIKE LOWER(")
            .push_bind(pattern)
            .push("))");
    }

    if let Some(rarity) = filter.rarity.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND rarity = ").push_bind(rarity.to_string());
    }

    if let Some(color) = filter.color.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND colors LIKE ")
            .push_bind(format!("%{}%", color));
    }

    if let Some(card_type) = filter.card_type.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND card_type LIKE ")
            .push_bind(format!("%{}%", card_type));
    }

    if let Some(mana_min) = filter.mana_min {
        qb.push(" AND mana_value >= ").push_bind(mana_min);
    }

    if let Some(mana_max) = filter.mana_max {
        qb.push(" AND mana_value <= ").push_bind(mana_max);
    }
}

/// Query records by owner and filter, sorted and paginated
pub async fn list_cards(
    pool: &SqlitePool,
    user_id: i64,
    filter: &CardFilter,
) -> Result<Vec<CardRecord>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM cards WHERE user_id = ");
    qb.push_bind(user_id);
    push_filter_clauses(&mut qb, filter);

    let sort = filter
        .sort
        .as_deref()
        .filter(|s| VALID_SORTS.contains(s))
        .unwrap_or("total_value");
    let order = if filter.order.as_deref() == Some("asc") {
        "ASC"
    } else {
        "DESC"
    };
    qb.push(format!(" ORDER BY {} {}", sort, order));

    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = filter.offset {
        qb.push(" OFFSET ").push_bind(offset);
    }

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(card_from_row).collect()
}

/// Count records by owner and filter
pub async fn count_cards(pool: &SqlitePool, user_id: i64, filter: &CardFilter) -> Result<i64> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM cards WHERE user_id = ");
    qb.push_bind(user_id);
    push_filter_clauses(&mut qb, filter);

    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Fetch a single record by (id, owner)
pub async fn get_card(pool: &SqlitePool, card_id: i64, user_id: i64) -> Result<Option<CardRecord>> {
    let row = sqlx::query("SELECT * FROM cards WHERE id = ? AND user_id = ?")
        .bind(card_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(card_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Candidates for the dedup-key test: same owner, same exact name
pub async fn find_by_name(pool: &SqlitePool, user_id: i64, name: &str) -> Result<Vec<CardRecord>> {
    let rows = sqlx::query("SELECT * FROM cards WHERE user_id = ? AND card_name = ?")
        .bind(user_id)
        .bind(name)
        .fetch_all(pool)
        .await?;
    rows.iter().map(card_from_row).collect()
}

/// Locate an existing record matching the full dedup key, if any
pub async fn find_dedup_match(
    pool: &SqlitePool,
    card: &NewCard,
) -> Result<Option<CardRecord>> {
    let candidates = find_by_name(pool, card.user_id, &card.card_name).await?;
    Ok(candidates
        .into_iter()
        .find(|existing| card.is_same_card_line(existing)))
}

/// Insert a new record, returning its id
pub async fn insert_card(pool: &SqlitePool, card: &NewCard) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO cards (
            user_id, card_name, set_name, set_code, collector_number,
            quantity, is_foil, condition, language, purchase_price,
            current_price, price_change, total_value, rarity, colors,
            mana_cost, mana_value, card_type, price_alert_threshold, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(card.user_id)
    .bind(&card.card_name)
    .bind(&card.set_name)
    .bind(&card.set_code)
    .bind(&card.collector_number)
    .bind(card.quantity)
    .bind(card.is_foil)
    .bind(&card.condition)
    .bind(&card.language)
    .bind(card.purchase_price)
    .bind(card.current_price)
    .bind(card.price_change)
    .bind(card.total_value)
    .bind(&card.rarity)
    .bind(&card.colors)
    .bind(&card.mana_cost)
    .bind(card.mana_value)
    .bind(&card.card_type)
    .bind(card.price_alert_threshold)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Set a record's quantity, recomputing total value and bumping the timestamp
pub async fn update_quantity(pool: &SqlitePool, card_id: i64, quantity: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE cards
        SET quantity = ?,
            total_value = current_price * ?,
            last_updated = ?
        WHERE id = ?
        "#,
    )
    .bind(quantity)
    .bind(quantity)
    .bind(Utc::now().to_rfc3339())
    .bind(card_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// User-editable details; derived price fields are recomputed in place
pub async fn update_details(
    pool: &SqlitePool,
    card_id: i64,
    user_id: i64,
    quantity: i64,
    condition: &str,
    purchase_price: f64,
    price_alert_threshold: f64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE cards
        SET quantity = ?,
            condition = ?,
            purchase_price = ?,
            price_alert_threshold = ?,
            total_value = current_price * ?,
            price_change = current_price - ?,
            last_updated = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(quantity)
    .bind(condition)
    .bind(purchase_price)
    .bind(price_alert_threshold)
    .bind(quantity)
    .bind(purchase_price)
    .bind(Utc::now().to_rfc3339())
    .bind(card_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Catalog-derived fields written back by the enrichment pass
#[derive(Debug, Clone)]
pub struct EnrichmentUpdate {
    pub current_price: f64,
    pub price_change: f64,
    pub total_value: f64,
    pub market_url: String,
    pub image_url: String,
    pub image_url_back: String,
    pub rarity: String,
    pub colors: String,
    pub mana_cost: String,
    pub mana_value: i64,
    pub card_type: String,
}

/// Overwrite catalog-derived fields on a record
pub async fn apply_enrichment(
    pool: &SqlitePool,
    card_id: i64,
    update: &EnrichmentUpdate,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE cards
        SET current_price = ?,
            price_change = ?,
            total_value = ?,
            market_url = ?,
            image_url = ?,
            image_url_back = ?,
            rarity = ?,
            colors = ?,
            mana_cost = ?,
            mana_value = ?,
            card_type = ?,
            last_updated = ?
        WHERE id = ?
        "#,
    )
    .bind(update.current_price)
    .bind(update.price_change)
    .bind(update.total_value)
    .bind(&update.market_url)
    .bind(&update.image_url)
    .bind(&update.image_url_back)
    .bind(&update.rarity)
    .bind(&update.colors)
    .bind(&update.mana_cost)
    .bind(update.mana_value)
    .bind(&update.card_type)
    .bind(Utc::now().to_rfc3339())
    .bind(card_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a record by (id, owner); returns whether a row was removed
pub async fn delete_card(pool: &SqlitePool, card_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = ? AND user_id = ?")
        .bind(card_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every record owned by a user; returns the number removed
pub async fn delete_all_cards(pool: &SqlitePool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cards WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// All record ids for an owner (price refresh over the whole collection)
pub async fn list_card_ids(pool: &SqlitePool, user_id: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM cards WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Aggregate statistics by owner
pub async fn collection_stats(pool: &SqlitePool, user_id: i64) -> Result<CollectionStats> {
    let row: (i64, i64, f64, f64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(quantity), 0),
            COALESCE(SUM(total_value), 0.0),
            COALESCE(AVG(current_price), 0.0)
        FROM cards WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(CollectionStats {
        total_cards: row.0,
        total_quantity: row.1,
        total_value: row.2,
        avg_price: row.3,
    })
}

/// Distinct non-empty attribute values for the filter UI
pub async fn filter_options(pool: &SqlitePool, user_id: i64) -> Result<FilterOptions> {
    let rarities: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT rarity FROM cards WHERE user_id = ? AND rarity != '' ORDER BY rarity",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let colors: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT colors FROM cards WHERE user_id = ? AND colors != '' ORDER BY colors",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let card_types: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT card_type FROM cards WHERE user_id = ? AND card_type != '' ORDER BY card_type",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(FilterOptions {
        rarities,
        colors,
        card_types,
    })
}
