//! Import workflow API
//!
//! The HTTP layer enqueues pipeline runs and polls their progress; the run
//! itself is owned by an `ImportJob`. One active run per owner — overlap
//! is rejected with 409 Conflict.

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::ImportProgress;
use crate::AppState;

/// Multipart field carrying the uploaded file
const CSV_FIELD_NAME: &str = "csv_file";

#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub started: bool,
}

/// POST /api/import
///
/// Accepts a multipart CSV upload and starts the import pipeline in the
/// background. Progress is polled via GET /api/import/status.
pub async fn start_import(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<StartImportResponse>> {
    let mut csv_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() == Some(CSV_FIELD_NAME) {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            csv_bytes = Some(data.to_vec());
            break;
        }
    }

    let csv_bytes = csv_bytes
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let job = state
        .pipeline()
        .start_csv_import(user.id, csv_bytes)
        .await
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    state.import_jobs.write().await.insert(user.id, job);

    tracing::info!(user_id = user.id, "CSV import started");

    Ok(Json(StartImportResponse { started: true }))
}

#[derive(Debug, Serialize)]
pub struct ImportStatusResponse {
    pub active: bool,
    pub latest_progress: Option<ImportProgress>,
}

/// GET /api/import/status
pub async fn import_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<ImportStatusResponse> {
    Json(ImportStatusResponse {
        active: state.progress.is_active(user.id).await,
        latest_progress: state.progress.latest(user.id).await,
    })
}

#[derive(Debug, Serialize)]
pub struct CancelImportResponse {
    pub cancelled: bool,
}

/// POST /api/import/cancel
///
/// Signals the owner's active run to stop; the run observes the token
/// between rows and terminates through the progress channel.
pub async fn cancel_import(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<CancelImportResponse>> {
    if !state.progress.is_active(user.id).await {
        return Err(ApiError::NotFound(
            "No active import for this user".to_string(),
        ));
    }

    let jobs = state.import_jobs.read().await;
    let job = jobs
        .get(&user.id)
        .ok_or_else(|| ApiError::NotFound("No active import for this user".to_string()))?;
    job.cancel();

    tracing::info!(user_id = user.id, "Import cancellation requested");

    Ok(Json(CancelImportResponse { cancelled: true }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshPricesRequest {
    /// Explicit record ids; empty means the owner's whole collection
    #[serde(default)]
    pub card_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct RefreshPricesResponse {
    pub started: bool,
    pub total: usize,
}

/// POST /api/cards/refresh_prices
///
/// Selective re-enrichment: runs only the price_update pass over the given
/// records (or all of the owner's records when none are given).
pub async fn refresh_prices(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<RefreshPricesRequest>,
) -> ApiResult<Json<RefreshPricesResponse>> {
    let card_ids = if request.card_ids.is_empty() {
        db::cards::list_card_ids(&state.db, user.id).await?
    } else {
        request.card_ids
    };

    if card_ids.is_empty() {
        return Err(ApiError::BadRequest("No cards selected".to_string()));
    }

    let total = card_ids.len();
    let job = state
        .pipeline()
        .start_price_refresh(user.id, card_ids)
        .await
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    state.import_jobs.write().await.insert(user.id, job);

    tracing::info!(user_id = user.id, total, "Price refresh started");

    Ok(Json(RefreshPricesResponse {
        started: true,
        total,
    }))
}
