//! Core services for packrat-ui
//!
//! The import pipeline, the row normalizer it feeds on, the catalog
//! lookup client, and the per-owner progress store.

pub mod import;
pub mod normalizer;
pub mod progress;
pub mod scryfall;

pub use import::{ImportJob, ImportOutcome, ImportPipeline};
pub use progress::{ProgressError, ProgressStore};
pub use scryfall::{CatalogLookup, ScryfallClient};
