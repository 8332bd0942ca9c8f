//! packrat-ui library - card inventory web service
//!
//! Exposes the application state, router construction and the core
//! services for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::{ImportJob, ImportPipeline, ProgressStore, ScryfallClient};

/// Upload size cap for import files
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Catalog lookup client (shared so all runs share one rate budget)
    pub scryfall: Arc<ScryfallClient>,
    /// Per-owner import progress slots
    pub progress: ProgressStore,
    /// Active pipeline jobs keyed by owner id
    pub import_jobs: Arc<RwLock<HashMap<i64, ImportJob>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, scryfall: Arc<ScryfallClient>) -> Self {
        Self {
            db,
            scryfall,
            progress: ProgressStore::new(),
            import_jobs: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
        }
    }

    /// Pipeline instance bound to this state's pool, client and progress store
    pub fn pipeline(&self) -> ImportPipeline<ScryfallClient> {
        ImportPipeline::new(
            self.db.clone(),
            Arc::clone(&self.scryfall),
            self.progress.clone(),
        )
    }
}

/// Build application router
///
/// Health and account creation are public; everything else sits behind the
/// bearer-session middleware.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require a valid session)
    let protected = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route(
            "/api/cards",
            get(api::cards::list_cards).post(api::cards::add_card),
        )
        .route("/api/cards/stats", get(api::cards::stats))
        .route("/api/cards/filters", get(api::cards::filter_options))
        .route("/api/cards/mass_delete", post(api::cards::mass_delete))
        .route("/api/cards/delete_all", post(api::cards::delete_all))
        .route("/api/cards/refresh_prices", post(api::import::refresh_prices))
        .route(
            "/api/cards/:card_id",
            get(api::cards::get_card)
                .put(api::cards::edit_card)
                .delete(api::cards::delete_card),
        )
        .route("/api/import", post(api::import::start_import))
        .route("/api/import/status", get(api::import::import_status))
        .route("/api/import/cancel", post(api::import::cancel_import))
        .route("/api/catalog/search", get(api::search::search_catalog))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
