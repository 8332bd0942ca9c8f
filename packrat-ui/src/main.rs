//! packrat-ui - Card inventory web service
//!
//! Users authenticate, add or bulk-import card records, and the service
//! enriches records with pricing and metadata from the Scryfall catalog.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use packrat_common::config;
use packrat_ui::services::ScryfallClient;
use packrat_ui::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "packrat-ui", about = "Packrat card inventory web service")]
struct Args {
    /// Root data folder (falls back to PACKRAT_ROOT, config file, OS default)
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP listen port
    #[arg(long, env = "PACKRAT_PORT", default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Packrat (packrat-ui) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref());
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = packrat_ui::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let scryfall = Arc::new(ScryfallClient::new()?);
    let state = AppState::new(pool, scryfall);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("packrat-ui listening on http://0.0.0.0:{}", args.port);
    info!("Health check: http://127.0.0.1:{}/health", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
