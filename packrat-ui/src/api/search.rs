//! Catalog autocomplete search

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::models::CatalogMatch;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/catalog/search?q=
///
/// Best-effort candidate list for interactive lookahead; queries shorter
/// than two characters short-circuit to an empty list.
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<CatalogMatch>> {
    let Some(q) = query.q.filter(|q| q.chars().count() >= 2) else {
        return Json(Vec::new());
    };

    Json(state.scryfall.search_cards_fuzzy(&q).await)
}
