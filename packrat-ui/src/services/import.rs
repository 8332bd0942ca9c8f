//! Import/enrichment pipeline
//!
//! Drives a run through reading → processing → importing → price_update →
//! complete (or error), publishing a progress snapshot on every transition.
//! The merge pass dedups rows against existing inventory; the enrichment
//! pass reconciles every touched record against the catalog, one lookup at
//! a time under the client's rate budget. Runs are spawned as explicit
//! jobs: awaitable, cancellable, one active run per owner.

use anyhow::{anyhow, Context, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::models::{ImportPhase, ImportProgress, NewCard};
use crate::services::normalizer::{normalize_row, RawRow};
use crate::services::progress::{ProgressError, ProgressStore};
use crate::services::scryfall::CatalogLookup;

/// Rows between cooperative pauses in the merge pass
const MERGE_YIELD_EVERY: usize = 10;
const MERGE_YIELD_SLEEP_MS: u64 = 10;

/// Final counts of a pipeline run
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOutcome {
    /// Rows merged or inserted by the merge pass
    pub imported: usize,
    /// Records that received catalog data in the enrichment pass
    pub updated: usize,
}

/// A running pipeline job
///
/// The HTTP layer holds this to poll, await, or cancel the run; terminal
/// state is reported through the owner's progress slot.
pub struct ImportJob {
    pub handle: JoinHandle<Result<ImportOutcome>>,
    pub cancel_token: CancellationToken,
}

impl ImportJob {
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// Pipeline orchestrator, generic over the catalog lookup seam
pub struct ImportPipeline<C> {
    db: SqlitePool,
    catalog: Arc<C>,
    progress: ProgressStore,
}

impl<C> Clone for ImportPipeline<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            catalog: Arc::clone(&self.catalog),
            progress: self.progress.clone(),
        }
    }
}

impl<C: CatalogLookup + 'static> ImportPipeline<C> {
    pub fn new(db: SqlitePool, catalog: Arc<C>, progress: ProgressStore) -> Self {
        Self {
            db,
            catalog,
            progress,
        }
    }

    /// Start a CSV import run as a background job.
    ///
    /// Claims the owner's progress slot before spawning; a second run for
    /// an owner with an active run is rejected.
    pub async fn start_csv_import(
        &self,
        user_id: i64,
        csv_bytes: Vec<u8>,
    ) -> Result<ImportJob, ProgressError> {
        self.progress.begin(user_id).await?;

        let pipeline = self.clone();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let result = pipeline.run_csv_import(user_id, csv_bytes, &token).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    user_id,
                    imported = outcome.imported,
                    updated = outcome.updated,
                    "Import run finished"
                ),
                Err(e) => tracing::error!(user_id, error = %e, "Import run failed"),
            }
            result
        });

        Ok(ImportJob {
            handle,
            cancel_token,
        })
    }

    /// Start a selective re-enrichment run over explicit record ids
    /// (bypasses ingest and merge; same progress and failure semantics).
    pub async fn start_price_refresh(
        &self,
        user_id: i64,
        card_ids: Vec<i64>,
    ) -> Result<ImportJob, ProgressError> {
        self.progress.begin(user_id).await?;

        let pipeline = self.clone();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let result = pipeline.run_price_refresh(user_id, card_ids, &token).await;
            match &result {
                Ok(outcome) => {
                    tracing::info!(user_id, updated = outcome.updated, "Price refresh finished")
                }
                Err(e) => tracing::error!(user_id, error = %e, "Price refresh failed"),
            }
            result
        });

        Ok(ImportJob {
            handle,
            cancel_token,
        })
    }

    async fn run_csv_import(
        &self,
        user_id: i64,
        csv_bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome> {
        self.progress
            .publish(
                user_id,
                ImportProgress::start("Reading CSV file...", 0, Some(ImportPhase::Reading)),
            )
            .await;

        match self.csv_import_inner(user_id, csv_bytes, cancel).await {
            Ok((outcome, total_rows)) => {
                self.progress
                    .finish(
                        user_id,
                        ImportProgress::complete(
                            format!(
                                "Successfully imported {} cards with {} price updates.",
                                outcome.imported, outcome.updated
                            ),
                            Some(outcome.imported),
                            outcome.updated,
                            total_rows,
                        ),
                    )
                    .await;
                Ok(outcome)
            }
            Err(e) => {
                self.progress
                    .finish(
                        user_id,
                        ImportProgress::error(format!("Import failed: {}", e), e.to_string()),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn csv_import_inner(
        &self,
        user_id: i64,
        csv_bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<(ImportOutcome, usize)> {
        // Ingest: a read failure is fatal to the run, no partial retry
        let rows = parse_rows(&csv_bytes)?;

        self.progress
            .publish(
                user_id,
                ImportProgress::progress(
                    ImportPhase::Processing,
                    format!("Processing {} cards...", rows.len()),
                    0,
                    rows.len(),
                ),
            )
            .await;

        // Normalize: defaults absorb malformed values, cannot fail per-row
        let cards: Vec<NewCard> = rows.iter().map(|row| normalize_row(row, user_id)).collect();
        let total = cards.len();

        let (imported, touched) = self.merge_pass(user_id, cards, cancel).await?;
        let updated = self.enrichment_pass(user_id, &touched, cancel).await?;

        Ok((ImportOutcome { imported, updated }, total))
    }

    /// Merge normalized rows into inventory: dedup-or-insert.
    ///
    /// Returns the success count and the ids touched (each at most once,
    /// in first-touch order) for the enrichment pass.
    async fn merge_pass(
        &self,
        user_id: i64,
        cards: Vec<NewCard>,
        cancel: &CancellationToken,
    ) -> Result<(usize, Vec<i64>)> {
        let total = cards.len();
        let mut imported = 0usize;
        let mut touched: Vec<i64> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();

        for (index, card) in cards.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(anyhow!("cancelled by user"));
            }

            self.progress
                .publish(
                    user_id,
                    ImportProgress::progress(
                        ImportPhase::Importing,
                        format!(
                            "Importing card {} of {}: {}",
                            index + 1,
                            total,
                            card.card_name
                        ),
                        index + 1,
                        total,
                    ),
                )
                .await;

            match self.merge_row(&card).await {
                Ok(card_id) => {
                    imported += 1;
                    if seen.insert(card_id) {
                        touched.push(card_id);
                    }
                }
                Err(e) => {
                    // Row is skipped; the batch continues
                    tracing::error!(
                        user_id,
                        card_name = %card.card_name,
                        error = %e,
                        "Failed to import row"
                    );
                }
            }

            // Cooperative pause so long imports don't starve other requests
            if (index + 1) % MERGE_YIELD_EVERY == 0 {
                tokio::time::sleep(Duration::from_millis(MERGE_YIELD_SLEEP_MS)).await;
            }
        }

        Ok((imported, touched))
    }

    /// Dedup-or-insert one row; returns the touched record id
    async fn merge_row(&self, card: &NewCard) -> Result<i64> {
        if let Some(existing) = db::cards::find_dedup_match(&self.db, card).await? {
            // Same card line: only the quantity grows
            db::cards::update_quantity(&self.db, existing.id, existing.quantity + card.quantity)
                .await?;
            Ok(existing.id)
        } else {
            db::cards::insert_card(&self.db, card).await
        }
    }

    /// Enrich every given record from the catalog, sequentially.
    ///
    /// A lookup miss or error leaves the record untouched and is never
    /// fatal to the batch; inter-call spacing is enforced by the client.
    async fn enrichment_pass(
        &self,
        user_id: i64,
        card_ids: &[i64],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let total = card_ids.len();
        let mut updated = 0usize;

        for (index, card_id) in card_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(anyhow!("cancelled by user"));
            }

            self.progress
                .publish(
                    user_id,
                    ImportProgress::progress(
                        ImportPhase::PriceUpdate,
                        format!("Updating prices {} of {}", index + 1, total),
                        index + 1,
                        total,
                    ),
                )
                .await;

            match self.enrich_one(user_id, *card_id).await {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(user_id, card_id, error = %e, "Failed to update card");
                }
            }
        }

        Ok(updated)
    }

    /// Enrich a single record; Ok(true) when catalog data was applied
    pub async fn enrich_one(&self, user_id: i64, card_id: i64) -> Result<bool> {
        let Some(card) = db::cards::get_card(&self.db, card_id, user_id).await? else {
            return Ok(false);
        };

        let set_code = (!card.set_code.is_empty()).then_some(card.set_code.as_str());
        let collector_number =
            (!card.collector_number.is_empty()).then_some(card.collector_number.as_str());

        let Some(found) = self
            .catalog
            .lookup(&card.card_name, set_code, collector_number)
            .await
        else {
            // No match: leave the record's fields untouched
            return Ok(false);
        };

        let current_price = found.price_for(card.is_foil);
        let update = db::cards::EnrichmentUpdate {
            current_price,
            price_change: current_price - card.purchase_price,
            total_value: current_price * card.quantity as f64,
            market_url: found.scryfall_uri,
            image_url: found.image_url,
            image_url_back: found.image_url_back,
            rarity: found.rarity,
            colors: found.colors,
            mana_cost: found.mana_cost,
            mana_value: found.mana_value,
            card_type: found.type_line,
        };
        db::cards::apply_enrichment(&self.db, card_id, &update).await?;

        Ok(true)
    }

    async fn run_price_refresh(
        &self,
        user_id: i64,
        card_ids: Vec<i64>,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome> {
        let total = card_ids.len();
        self.progress
            .publish(
                user_id,
                ImportProgress::start(
                    format!("Starting price update for {} selected cards...", total),
                    total,
                    None,
                ),
            )
            .await;

        match self.enrichment_pass(user_id, &card_ids, cancel).await {
            Ok(updated) => {
                self.progress
                    .finish(
                        user_id,
                        ImportProgress::complete(
                            format!("Successfully updated {} selected cards", updated),
                            None,
                            updated,
                            total,
                        ),
                    )
                    .await;
                Ok(ImportOutcome {
                    imported: 0,
                    updated,
                })
            }
            Err(e) => {
                self.progress
                    .finish(
                        user_id,
                        ImportProgress::error(format!("Price update failed: {}", e), e.to_string()),
                    )
                    .await;
                Err(e)
            }
        }
    }
}

/// Parse the uploaded tabular file into raw header→value rows
fn parse_rows(csv_bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_bytes);

    let headers = reader
        .headers()
        .context("Failed to read CSV header row")?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV row")?;
        let mut row = RawRow::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(index) {
                row.insert(header.to_string(), value.to_string());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
