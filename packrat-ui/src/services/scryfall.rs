//! Scryfall catalog client
//!
//! Best-effort, rate-limited lookups against the external card catalog.
//! Transport and parse failures are logged and reported as "no match" —
//! callers never receive an error from this component; absence of data is
//! the only failure signal.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::CatalogMatch;

const SCRYFALL_BASE_URL: &str = "https://api.scryfall.com";
const USER_AGENT: &str = concat!("packrat/", env!("CARGO_PKG_VERSION"));
/// Minimum spacing between catalog requests
const RATE_LIMIT_MS: u64 = 100;
/// Cap on fuzzy search results returned to the UI
const SEARCH_RESULT_LIMIT: usize = 10;

/// Catalog lookup seam consumed by the import pipeline
pub trait CatalogLookup: Send + Sync {
    /// Single-card lookup, narrowing by set and collector number when given
    fn lookup(
        &self,
        name: &str,
        set_code: Option<&str>,
        collector_number: Option<&str>,
    ) -> impl std::future::Future<Output = Option<CatalogMatch>> + Send;
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Scryfall /cards/search response envelope
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_cards: i64,
    #[serde(default)]
    data: Vec<ScryfallCardData>,
}

/// Raw card object as returned by the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct ScryfallCardData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub prices: Prices,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub card_faces: Option<Vec<CardFace>>,
    #[serde(default)]
    pub scryfall_uri: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(default)]
    pub usd_foil: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

/// One face of a double-faced card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

/// Scryfall API client
pub struct ScryfallClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl ScryfallClient {
    pub fn new() -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    /// Issue one /cards/search request; any failure degrades to None
    async fn fetch_search(&self, params: &[(&str, &str)]) -> Option<SearchResponse> {
        self.rate_limiter.wait().await;

        let url = format!("{}/cards/search", SCRYFALL_BASE_URL);
        let response = match self.http_client.get(&url).query(params).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Catalog request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            // The catalog reports an empty result set as a 404
            tracing::debug!(status = %response.status(), "Catalog search returned no data");
            return None;
        }

        match response.json::<SearchResponse>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse catalog response");
                None
            }
        }
    }

    /// Single-card lookup by name, optionally narrowed by set and collector number.
    ///
    /// A zero-result narrowed query falls back to a name-only query before
    /// reporting "no match" — recovers cards whose stored set/number
    /// metadata is stale or wrong.
    pub async fn search_card(
        &self,
        name: &str,
        set_code: Option<&str>,
        collector_number: Option<&str>,
    ) -> Option<CatalogMatch> {
        let set_code = set_code.filter(|s| !s.is_empty());
        let collector_number = collector_number.filter(|s| !s.is_empty());

        let mut query = format!("!\"{}\"", name);
        if let Some(set) = set_code {
            query.push_str(&format!(" set:{}", set));
        }
        if let Some(cn) = collector_number {
            query.push_str(&format!(" cn:{}", cn));
        }

        if let Some(body) = self.fetch_search(&[("q", query.as_str())]).await {
            if body.total_cards > 0 {
                return body.data.into_iter().next().map(extract_match);
            }
        }

        // Fallback: retry by name alone when the narrowed query found nothing
        if set_code.is_some() || collector_number.is_some() {
            let fallback = format!("!\"{}\"", name);
            if let Some(body) = self.fetch_search(&[("q", fallback.as_str())]).await {
                if body.total_cards > 0 {
                    return body.data.into_iter().next().map(extract_match);
                }
            }
        }

        tracing::debug!(name = %name, "No catalog match");
        None
    }

    /// Fuzzy multi-result search for interactive lookahead
    pub async fn search_cards_fuzzy(&self, query: &str) -> Vec<CatalogMatch> {
        if query.chars().count() < 2 {
            return Vec::new();
        }

        // Exact match first, then fuzzy
        let q = format!("!\"{}\" OR \"{}\"", query, query);
        let Some(body) = self
            .fetch_search(&[("q", q.as_str()), ("order", "name"), ("unique", "prints")])
            .await
        else {
            return Vec::new();
        };

        let matches: Vec<CatalogMatch> = body.data.into_iter().map(extract_match).collect();
        rank_matches(matches, query)
    }
}

impl CatalogLookup for ScryfallClient {
    async fn lookup(
        &self,
        name: &str,
        set_code: Option<&str>,
        collector_number: Option<&str>,
    ) -> Option<CatalogMatch> {
        self.search_card(name, set_code, collector_number).await
    }
}

/// Order search results: exact name match, then prefix, then substring,
/// original relative order as final tie-break; capped to the result limit.
fn rank_matches(matches: Vec<CatalogMatch>, query: &str) -> Vec<CatalogMatch> {
    let query_lower = query.to_lowercase();

    let mut indexed: Vec<(usize, CatalogMatch)> = matches.into_iter().enumerate().collect();
    indexed.sort_by_key(|(index, card)| {
        let name = card.name.to_lowercase();
        let tier = if name == query_lower {
            0
        } else if name.starts_with(&query_lower) {
            1
        } else if name.contains(&query_lower) {
            2
        } else {
            3
        };
        (tier, *index)
    });

    indexed
        .into_iter()
        .take(SEARCH_RESULT_LIMIT)
        .map(|(_, card)| card)
        .collect()
}

/// Flatten a raw catalog card into a `CatalogMatch`
///
/// Double-faced cards carry no top-level image set; the first face supplies
/// the primary image, mana cost and type line, the second face (if present)
/// supplies the back image.
pub fn extract_match(data: ScryfallCardData) -> CatalogMatch {
    let faces = data.card_faces.as_deref().unwrap_or(&[]);

    let mut image_url = String::new();
    let mut image_url_back = String::new();
    let mut image_url_small = String::new();

    if let Some(uris) = &data.image_uris {
        image_url = uris.normal.clone().unwrap_or_default();
        image_url_small = uris.small.clone().unwrap_or_default();
    } else if let Some(first_face) = faces.first() {
        if let Some(uris) = &first_face.image_uris {
            image_url = uris.normal.clone().unwrap_or_default();
            image_url_small = uris.small.clone().unwrap_or_default();
        }
        if let Some(second_face) = faces.get(1) {
            if let Some(uris) = &second_face.image_uris {
                image_url_back = uris.normal.clone().unwrap_or_default();
            }
        }
    }

    let raw_mana_cost = data
        .mana_cost
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| faces.first().and_then(|f| f.mana_cost.clone()))
        .unwrap_or_default();

    let type_line = data
        .type_line
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| faces.first().and_then(|f| f.type_line.clone()))
        .unwrap_or_default();

    CatalogMatch {
        name: data.name,
        set_name: data.set_name,
        set_code: data.set.to_uppercase(),
        collector_number: data.collector_number,
        mana_value: mana_value(&raw_mana_cost),
        mana_cost: strip_braces(&raw_mana_cost),
        type_line,
        rarity: title_case(&data.rarity),
        colors: wubrg_string(data.colors.as_deref().unwrap_or(&[])),
        price_usd: data.prices.usd.as_deref().and_then(|p| p.parse().ok()),
        price_usd_foil: data.prices.usd_foil.as_deref().and_then(|p| p.parse().ok()),
        image_url,
        image_url_back,
        image_url_small,
        scryfall_uri: data.scryfall_uri,
    }
}

/// Total cost computed from brace-delimited mana notation.
///
/// Hybrid symbols contribute the maximum of their alternatives, variable
/// symbols (X/Y/Z) contribute zero, generic numeric symbols their printed
/// number, and single pips 1.
pub fn mana_value(mana_cost: &str) -> i64 {
    let cost = mana_cost.trim().to_uppercase();
    let mut total = 0i64;
    let mut rest = cost.as_str();

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let symbol = &rest[open + 1..open + close];
        total += symbol_value(symbol);
        rest = &rest[open + close + 1..];
    }

    total
}

fn symbol_value(symbol: &str) -> i64 {
    // Hybrid symbols: {2/W}, {W/U}, {W/P}
    if symbol.contains('/') {
        return symbol
            .split('/')
            .map(|part| part.parse::<i64>().unwrap_or(1))
            .max()
            .unwrap_or(0);
    }

    if let Ok(number) = symbol.parse::<i64>() {
        return number;
    }

    match symbol {
        // Variable costs don't count toward the total
        "X" | "Y" | "Z" => 0,
        "W" | "U" | "B" | "R" | "G" | "C" | "S" => 1,
        _ => 0,
    }
}

/// Render a color list in canonical WUBRG order with no separators
pub fn wubrg_string(colors: &[String]) -> String {
    ["W", "U", "B", "R", "G"]
        .iter()
        .filter(|color| colors.iter().any(|c| c == *color))
        .copied()
        .collect()
}

/// Mana cost display form: the raw notation with braces removed
fn strip_braces(mana_cost: &str) -> String {
    mana_cost.chars().filter(|c| *c != '{' && *c != '}').collect()
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
