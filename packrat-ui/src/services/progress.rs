//! Per-owner import progress store
//!
//! One mutable slot per owner, written by the pipeline and polled by the
//! HTTP layer. `begin` atomically check-and-sets the active flag so that a
//! second concurrent run for the same owner is rejected rather than
//! silently overlapping. The last snapshot is retained after a run ends
//! until the next run overwrites it.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::ImportProgress;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("An import is already running for this user")]
    AlreadyActive,
}

#[derive(Default)]
struct OwnerSlot {
    active: bool,
    latest: Option<ImportProgress>,
}

/// Progress slots keyed by owner id
#[derive(Clone, Default)]
pub struct ProgressStore {
    slots: Arc<RwLock<HashMap<i64, OwnerSlot>>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the owner's slot for a new run.
    ///
    /// Fails fast when a run is already active; the check and the set happen
    /// under one write lock.
    pub async fn begin(&self, owner_id: i64) -> Result<(), ProgressError> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(owner_id).or_default();
        if slot.active {
            return Err(ProgressError::AlreadyActive);
        }
        slot.active = true;
        slot.latest = None;
        Ok(())
    }

    /// Overwrite the owner's snapshot in place
    pub async fn publish(&self, owner_id: i64, progress: ImportProgress) {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(owner_id).or_default();
        slot.latest = Some(progress);
    }

    /// Publish a terminal snapshot and release the slot
    pub async fn finish(&self, owner_id: i64, progress: ImportProgress) {
        debug_assert!(progress.is_terminal());
        let mut slots = self.slots.write().await;
        let slot = slots.entry(owner_id).or_default();
        slot.latest = Some(progress);
        slot.active = false;
    }

    pub async fn is_active(&self, owner_id: i64) -> bool {
        let slots = self.slots.read().await;
        slots.get(&owner_id).map(|s| s.active).unwrap_or(false)
    }

    pub async fn latest(&self, owner_id: i64) -> Option<ImportProgress> {
        let slots = self.slots.read().await;
        slots.get(&owner_id).and_then(|s| s.latest.clone())
    }
}
