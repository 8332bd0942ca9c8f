//! Row normalizer for tabular imports
//!
//! Maps arbitrary column headers onto the canonical card schema with type
//! coercion and fallback defaults. Pure functions — no I/O, deterministic
//! given the row and the alias tables. Malformed values are absorbed via
//! defaults; unmapped columns are silently ignored.

use std::collections::HashMap;

use crate::models::NewCard;

/// Raw tabular row: header string → cell value
pub type RawRow = HashMap<String, String>;

/// Map a raw row onto a partial card record for the given owner.
///
/// Price-derived fields (current price, price change, total value) are
/// always pre-set to zero; only the enrichment pass fills them.
pub fn normalize_row(row: &RawRow, user_id: i64) -> NewCard {
    NewCard {
        user_id,
        card_name: column_value(row, &["card_name", "Card Name", "name", "Name"]),
        set_name: column_value(row, &["set_name", "Set Name", "set", "Set"]),
        set_code: column_value(row, &["set_code", "Set Code", "setCode"]),
        collector_number: column_value(
            row,
            &["collector_number", "Collector Number", "collectorNumber", "number"],
        ),
        quantity: parse_quantity(&column_value(row, &["quantity", "Quantity", "qty", "Qty"])),
        is_foil: parse_flag(&column_value(row, &["is_foil", "Is Foil", "foil", "Foil"])),
        condition: non_empty_or(column_value(row, &["condition", "Condition"]), "Near Mint"),
        language: non_empty_or(column_value(row, &["language", "Language"]), "English"),
        purchase_price: parse_price(&column_value(
            row,
            &["purchase_price", "Purchase Price", "purchasePrice"],
        )),
        current_price: 0.0,
        price_change: 0.0,
        total_value: 0.0,
        rarity: column_value(row, &["rarity", "Rarity"]),
        colors: column_value(row, &["colors", "Colors"]),
        mana_cost: column_value(row, &["mana_cost", "Mana Cost", "manaCost"]),
        mana_value: column_value(row, &["mana_value", "Mana Value", "manaValue", "cmc", "CMC"])
            .parse()
            .unwrap_or(0),
        card_type: column_value(row, &["card_type", "Card Type", "cardType", "type", "Type"]),
        price_alert_threshold: 0.0,
    }
}

/// First non-empty value among the accepted header spellings, trimmed
fn column_value(row: &RawRow, possible_keys: &[&str]) -> String {
    for key in possible_keys {
        if let Some(value) = row.get(*key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}

/// Quantity defaults to 1 when missing or unparseable, never zero
fn parse_quantity(value: &str) -> i64 {
    if value.is_empty() {
        return 1;
    }
    value.parse().unwrap_or(1)
}

/// Foil flag from free text: true/1/yes/y (case-insensitive)
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

fn parse_price(value: &str) -> f64 {
    value.parse().unwrap_or(0.0)
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
