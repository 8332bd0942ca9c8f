//! Domain types for the packrat inventory service
//!
//! Card records are owned by the database layer (`db::cards`) and mutated
//! only through its operations. `CatalogMatch` is the transient result of a
//! catalog lookup, consumed immediately into a card record. `ImportProgress`
//! is the per-owner snapshot published by the import pipeline and polled by
//! the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line-item of a card held by a user
#[derive(Debug, Clone, Serialize)]
pub struct CardRecord {
    pub id: i64,
    pub user_id: i64,
    pub card_name: String,
    pub set_name: String,
    pub set_code: String,
    pub collector_number: String,
    pub quantity: i64,
    pub is_foil: bool,
    pub condition: String,
    pub language: String,
    pub purchase_price: f64,
    pub current_price: f64,
    pub price_change: f64,
    /// Always current_price * quantity; recomputed whenever either changes
    pub total_value: f64,
    pub market_url: Option<String>,
    pub image_url: Option<String>,
    pub image_url_back: Option<String>,
    pub rarity: String,
    /// Color identity in canonical WUBRG order, no separators
    pub colors: String,
    pub mana_cost: String,
    pub mana_value: i64,
    pub card_type: String,
    pub price_alert_threshold: f64,
    pub last_updated: DateTime<Utc>,
}

/// Insert payload for a card record (normalizer output / manual add)
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub user_id: i64,
    pub card_name: String,
    pub set_name: String,
    pub set_code: String,
    pub collector_number: String,
    pub quantity: i64,
    pub is_foil: bool,
    pub condition: String,
    pub language: String,
    pub purchase_price: f64,
    pub current_price: f64,
    pub price_change: f64,
    pub total_value: f64,
    pub rarity: String,
    pub colors: String,
    pub mana_cost: String,
    pub mana_value: i64,
    pub card_type: String,
    pub price_alert_threshold: f64,
}

impl NewCard {
    /// Full dedup-key test against an existing record.
    ///
    /// The tuple (owner, name, set code, collector number, foil, condition)
    /// identifies "the same physical card line" for merge-vs-insert decisions.
    pub fn is_same_card_line(&self, existing: &CardRecord) -> bool {
        self.user_id == existing.user_id
            && self.card_name == existing.card_name
            && self.set_code == existing.set_code
            && self.collector_number == existing.collector_number
            && self.is_foil == existing.is_foil
            && self.condition == existing.condition
    }
}

/// Transient result of a catalog lookup
#[derive(Debug, Clone, Serialize)]
pub struct CatalogMatch {
    pub name: String,
    pub set_name: String,
    /// Set code, upper-cased
    pub set_code: String,
    pub collector_number: String,
    /// Mana cost display string with braces stripped (e.g. "2WW")
    pub mana_cost: String,
    /// Computed from the raw mana-cost notation
    pub mana_value: i64,
    pub type_line: String,
    /// Title-cased rarity (e.g. "Mythic")
    pub rarity: String,
    /// WUBRG-ordered color string
    pub colors: String,
    pub price_usd: Option<f64>,
    pub price_usd_foil: Option<f64>,
    /// Front-face image (normal size)
    pub image_url: String,
    /// Back-face image for double-faced cards, empty otherwise
    pub image_url_back: String,
    /// Small image for autocomplete thumbnails
    pub image_url_small: String,
    pub scryfall_uri: String,
}

impl CatalogMatch {
    /// Price for the given finish, defaulting absent prices to 0.0
    pub fn price_for(&self, is_foil: bool) -> f64 {
        let price = if is_foil {
            self.price_usd_foil
        } else {
            self.price_usd
        };
        price.unwrap_or(0.0)
    }
}

/// Snapshot kind published on every pipeline transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Start,
    Progress,
    Complete,
    Error,
}

/// Pipeline phase within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Reading,
    Processing,
    Importing,
    PriceUpdate,
}

/// Per-owner import progress snapshot
///
/// Overwritten in place on every phase transition; retained after
/// completion until the next run overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ImportPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportProgress {
    pub fn start(message: impl Into<String>, total: usize, phase: Option<ImportPhase>) -> Self {
        Self {
            kind: ProgressKind::Start,
            message: message.into(),
            current: Some(0),
            total: Some(total),
            phase,
            imported_count: None,
            updated_count: None,
            error: None,
        }
    }

    pub fn progress(
        phase: ImportPhase,
        message: impl Into<String>,
        current: usize,
        total: usize,
    ) -> Self {
        Self {
            kind: ProgressKind::Progress,
            message: message.into(),
            current: Some(current),
            total: Some(total),
            phase: Some(phase),
            imported_count: None,
            updated_count: None,
            error: None,
        }
    }

    pub fn complete(
        message: impl Into<String>,
        imported_count: Option<usize>,
        updated_count: usize,
        total: usize,
    ) -> Self {
        Self {
            kind: ProgressKind::Complete,
            message: message.into(),
            current: None,
            total: Some(total),
            phase: None,
            imported_count,
            updated_count: Some(updated_count),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Error,
            message: message.into(),
            current: None,
            total: None,
            phase: None,
            imported_count: None,
            updated_count: None,
            error: Some(detail.into()),
        }
    }

    /// Terminal snapshots end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ProgressKind::Complete | ProgressKind::Error)
    }
}

/// Filter predicate for card queries
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    /// Case-insensitive substring over name, set name and type line
    pub search: Option<String>,
    pub rarity: Option<String>,
    /// Substring match against the colors string
    pub color: Option<String>,
    pub card_type: Option<String>,
    pub mana_min: Option<i64>,
    pub mana_max: Option<i64>,
    /// Sort key, validated against an allow-list by the store
    pub sort: Option<String>,
    /// "asc" or "desc" (default)
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregate statistics for one owner's collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub total_cards: i64,
    pub total_quantity: i64,
    pub total_value: f64,
    pub avg_price: f64,
}

/// Distinct attribute values for filter dropdowns
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub rarities: Vec<String>,
    pub colors: Vec<String>,
    pub card_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, set_code: &str, foil: bool, condition: &str) -> CardRecord {
        CardRecord {
            id: 1,
            user_id: 7,
            card_name: name.to_string(),
            set_name: String::new(),
            set_code: set_code.to_string(),
            collector_number: "42".to_string(),
            quantity: 1,
            is_foil: foil,
            condition: condition.to_string(),
            language: "English".to_string(),
            purchase_price: 0.0,
            current_price: 0.0,
            price_change: 0.0,
            total_value: 0.0,
            market_url: None,
            image_url: None,
            image_url_back: None,
            rarity: String::new(),
            colors: String::new(),
            mana_cost: String::new(),
            mana_value: 0,
            card_type: String::new(),
            price_alert_threshold: 0.0,
            last_updated: Utc::now(),
        }
    }

    fn new_card(name: &str, set_code: &str, foil: bool, condition: &str) -> NewCard {
        NewCard {
            user_id: 7,
            card_name: name.to_string(),
            set_name: String::new(),
            set_code: set_code.to_string(),
            collector_number: "42".to_string(),
            quantity: 3,
            is_foil: foil,
            condition: condition.to_string(),
            language: "English".to_string(),
            purchase_price: 0.0,
            current_price: 0.0,
            price_change: 0.0,
            total_value: 0.0,
            rarity: String::new(),
            colors: String::new(),
            mana_cost: String::new(),
            mana_value: 0,
            card_type: String::new(),
            price_alert_threshold: 0.0,
        }
    }

    #[test]
    fn dedup_key_matches_same_line() {
        let existing = record("Lightning Bolt", "LEA", false, "Near Mint");
        let incoming = new_card("Lightning Bolt", "LEA", false, "Near Mint");
        assert!(incoming.is_same_card_line(&existing));
    }

    #[test]
    fn dedup_key_distinguishes_foil() {
        let existing = record("Lightning Bolt", "LEA", false, "Near Mint");
        let incoming = new_card("Lightning Bolt", "LEA", true, "Near Mint");
        assert!(!incoming.is_same_card_line(&existing));
    }

    #[test]
    fn dedup_key_distinguishes_condition() {
        let existing = record("Lightning Bolt", "LEA", false, "Near Mint");
        let incoming = new_card("Lightning Bolt", "LEA", false, "Played");
        assert!(!incoming.is_same_card_line(&existing));
    }

    #[test]
    fn catalog_match_price_defaults_to_zero() {
        let m = CatalogMatch {
            name: String::new(),
            set_name: String::new(),
            set_code: String::new(),
            collector_number: String::new(),
            mana_cost: String::new(),
            mana_value: 0,
            type_line: String::new(),
            rarity: String::new(),
            colors: String::new(),
            price_usd: Some(1.5),
            price_usd_foil: None,
            image_url: String::new(),
            image_url_back: String::new(),
            image_url_small: String::new(),
            scryfall_uri: String::new(),
        };
        assert_eq!(m.price_for(false), 1.5);
        assert_eq!(m.price_for(true), 0.0);
    }

    #[test]
    fn progress_snapshot_serializes_kind_as_type() {
        let p = ImportProgress::start("Reading CSV file...", 0, Some(ImportPhase::Reading));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["phase"], "reading");
    }

    #[test]
    fn terminal_snapshots() {
        assert!(ImportProgress::complete("done", Some(1), 1, 1).is_terminal());
        assert!(ImportProgress::error("failed", "cause").is_terminal());
        assert!(!ImportProgress::progress(ImportPhase::Importing, "x", 1, 2).is_terminal());
    }
}
