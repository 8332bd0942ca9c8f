//! Card inventory API
//!
//! Listing with filters and pagination, manual add with dedup merge,
//! editing, deletion and aggregate views. Manual adds trigger a background
//! catalog fetch for the new record; its failure only logs.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::CurrentUser;
use crate::db;
use crate::db::cards::PAGE_SIZE;
use crate::error::{ApiError, ApiResult};
use crate::models::{CardFilter, CardRecord, CollectionStats, FilterOptions, NewCard};
use crate::AppState;

/// Query parameters for the card listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Page number (1-indexed)
    pub page: Option<i64>,
    pub search: Option<String>,
    pub rarity: Option<String>,
    pub color: Option<String>,
    pub card_type: Option<String>,
    /// Kept as strings so blank form values are ignored rather than rejected
    pub mana_min: Option<String>,
    pub mana_max: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub pages: i64,
    pub total: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
pub struct CardListResponse {
    pub cards: Vec<CardRecord>,
    pub pagination: Pagination,
}

/// GET /api/cards
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<CardListResponse>> {
    let page = query.page.unwrap_or(1).max(1);

    let filter = CardFilter {
        search: query.search,
        rarity: query.rarity,
        color: query.color,
        card_type: query.card_type,
        mana_min: query.mana_min.as_deref().and_then(|v| v.parse().ok()),
        mana_max: query.mana_max.as_deref().and_then(|v| v.parse().ok()),
        sort: query.sort,
        order: query.order,
        limit: Some(PAGE_SIZE),
        offset: Some((page - 1) * PAGE_SIZE),
    };

    let cards = db::cards::list_cards(&state.db, user.id, &filter).await?;
    let total = db::cards::count_cards(&state.db, user.id, &filter).await?;
    let pages = (total + PAGE_SIZE - 1) / PAGE_SIZE;

    Ok(Json(CardListResponse {
        cards,
        pagination: Pagination {
            page,
            pages,
            total,
            has_prev: page > 1,
            has_next: page < pages,
        },
    }))
}

/// GET /api/cards/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<CollectionStats>> {
    Ok(Json(db::cards::collection_stats(&state.db, user.id).await?))
}

/// GET /api/cards/filters
pub async fn filter_options(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<FilterOptions>> {
    Ok(Json(db::cards::filter_options(&state.db, user.id).await?))
}

/// GET /api/cards/:card_id
pub async fn get_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
) -> ApiResult<Json<CardRecord>> {
    let card = db::cards::get_card(&state.db, card_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card not found: {}", card_id)))?;
    Ok(Json(card))
}

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub card_name: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub set_code: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default)]
    pub purchase_price: f64,
    #[serde(default)]
    pub is_foil: bool,
}

fn default_quantity() -> i64 {
    1
}

fn default_condition() -> String {
    "Near Mint".to_string()
}

#[derive(Debug, Serialize)]
pub struct AddCardResponse {
    pub id: i64,
    /// True when the add merged into an existing card line
    pub merged: bool,
    pub quantity: i64,
}

/// POST /api/cards
///
/// Dedup-or-insert against the full dedup key: an existing card line only
/// grows in quantity; a new line is inserted with zeroed price fields and
/// enriched from the catalog in the background.
pub async fn add_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<AddCardRequest>,
) -> ApiResult<Json<AddCardResponse>> {
    let card_name = request.card_name.trim().to_string();
    if card_name.is_empty() {
        return Err(ApiError::BadRequest("Card name is required".to_string()));
    }

    let new_card = NewCard {
        user_id: user.id,
        card_name,
        set_name: request.set_name.trim().to_string(),
        set_code: request.set_code.trim().to_string(),
        collector_number: request.collector_number.trim().to_string(),
        quantity: request.quantity.max(1),
        is_foil: request.is_foil,
        condition: request.condition,
        language: "English".to_string(),
        purchase_price: request.purchase_price,
        current_price: 0.0,
        price_change: 0.0,
        total_value: 0.0,
        rarity: String::new(),
        colors: String::new(),
        mana_cost: String::new(),
        mana_value: 0,
        card_type: String::new(),
        price_alert_threshold: 0.0,
    };

    if let Some(existing) = db::cards::find_dedup_match(&state.db, &new_card).await? {
        let new_quantity = existing.quantity + new_card.quantity;
        db::cards::update_quantity(&state.db, existing.id, new_quantity).await?;
        return Ok(Json(AddCardResponse {
            id: existing.id,
            merged: true,
            quantity: new_quantity,
        }));
    }

    let quantity = new_card.quantity;
    let id = db::cards::insert_card(&state.db, &new_card).await?;

    // Fetch catalog data for the new record in the background
    let pipeline = state.pipeline();
    let user_id = user.id;
    tokio::spawn(async move {
        match pipeline.enrich_one(user_id, id).await {
            Ok(true) => tracing::info!(card_id = id, "Auto-updated card data"),
            Ok(false) => tracing::debug!(card_id = id, "No catalog match for new card"),
            Err(e) => {
                tracing::error!(card_id = id, error = %e, "Background card data fetch failed")
            }
        }
    });

    Ok(Json(AddCardResponse {
        id,
        merged: false,
        quantity,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EditCardRequest {
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default)]
    pub purchase_price: f64,
    #[serde(default)]
    pub price_alert_threshold: f64,
}

/// PUT /api/cards/:card_id
pub async fn edit_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
    Json(request): Json<EditCardRequest>,
) -> ApiResult<Json<CardRecord>> {
    let found = db::cards::update_details(
        &state.db,
        card_id,
        user.id,
        request.quantity.max(0),
        &request.condition,
        request.purchase_price,
        request.price_alert_threshold,
    )
    .await?;

    if !found {
        return Err(ApiError::NotFound(format!("Card not found: {}", card_id)));
    }

    let card = db::cards::get_card(&state.db, card_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card not found: {}", card_id)))?;
    Ok(Json(card))
}

/// DELETE /api/cards/:card_id
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = db::cards::delete_card(&state.db, card_id, user.id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Card not found: {}", card_id)));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct MassDeleteRequest {
    pub card_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct MassDeleteResponse {
    pub deleted_count: usize,
}

/// POST /api/cards/mass_delete
pub async fn mass_delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<MassDeleteRequest>,
) -> ApiResult<Json<MassDeleteResponse>> {
    if request.card_ids.is_empty() {
        return Err(ApiError::BadRequest("No cards selected".to_string()));
    }

    let mut deleted_count = 0usize;
    for card_id in request.card_ids {
        match db::cards::delete_card(&state.db, card_id, user.id).await {
            Ok(true) => deleted_count += 1,
            Ok(false) => {}
            Err(e) => tracing::error!(card_id, error = %e, "Error deleting card"),
        }
    }

    Ok(Json(MassDeleteResponse { deleted_count }))
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub deleted_count: u64,
}

/// POST /api/cards/delete_all
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<DeleteAllResponse>> {
    let deleted_count = db::cards::delete_all_cards(&state.db, user.id).await?;
    if deleted_count == 0 {
        return Err(ApiError::BadRequest("No cards to delete".to_string()));
    }
    Ok(Json(DeleteAllResponse { deleted_count }))
}
