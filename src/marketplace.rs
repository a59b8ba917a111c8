use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, ImageTarget};
use crate::settings::Settings;

const SEARCH_URL: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";
const RESULT_LIMIT: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Listing titles containing any of these are sets, lots or sealed product.
const BAD_TITLE_KEYWORDS: &[&str] = &[
    "team set",
    "complete set",
    "factory set",
    "base set",
    "master set",
    "lot",
    "card lot",
    "mixed lot",
    "assorted",
    "random",
    "box",
    "case",
    "pick your card",
    "pick from list",
];

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("marketplace token is not configured (set CARDS_EBAY_TOKEN)")]
    MissingToken,
    #[error("marketplace request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("marketplace returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl LookupError {
    fn is_retryable(&self) -> bool {
        matches!(self, LookupError::Status { status, .. } if *status == 429 || *status >= 500)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "itemSummaries", default)]
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ItemSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    image: Option<ItemImage>,
    #[serde(rename = "thumbnailImages", default)]
    thumbnail_images: Vec<ItemImage>,
}

#[derive(Debug, Deserialize)]
struct ItemImage {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
}

impl ItemSummary {
    fn image_url(&self) -> Option<&str> {
        self.image
            .as_ref()
            .and_then(|i| i.image_url.as_deref())
            .filter(|u| !u.is_empty())
            .or_else(|| {
                self.thumbnail_images
                    .first()
                    .and_then(|i| i.image_url.as_deref())
                    .filter(|u| !u.is_empty())
            })
    }
}

pub struct MarketplaceClient {
    http: reqwest::Client,
    token: String,
    marketplace: String,
}

impl MarketplaceClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, LookupError> {
        let token = settings
            .ebay_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(LookupError::MissingToken)?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            token,
            marketplace: settings.ebay_marketplace.clone(),
        })
    }

    /// Search with exponential backoff on rate limits and server errors.
    pub async fn search(&self, query: &str) -> Result<Vec<ItemSummary>, LookupError> {
        let mut attempt = 0;
        loop {
            match self.search_once(query).await {
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Marketplace busy (attempt {}/{}), backing off {:.1}s: {}",
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn search_once(&self, query: &str) -> Result<Vec<ItemSummary>, LookupError> {
        let limit = RESULT_LIMIT.to_string();
        let resp = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&self.token)
            .header("X-EBAY-C-MARKETPLACE-ID", &self.marketplace)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed.item_summaries)
    }

    /// Best image for a catalog card, `None` when nothing usable was listed.
    pub async fn find_image(&self, target: &ImageTarget) -> Result<Option<String>, LookupError> {
        let query = build_query(target);
        if query.is_empty() {
            return Ok(None);
        }
        let items = self.search(&query).await?;
        debug!(query = %query, results = items.len(), "marketplace search");
        Ok(choose_image(&items, &target.player_name))
    }
}

/// "2024-25 Upper Deck Base Connor Bedard #201"
pub fn build_query(target: &ImageTarget) -> String {
    let number = if target.card_number.is_empty() {
        String::new()
    } else {
        format!("#{}", target.card_number)
    };
    [
        target.year.as_str(),
        target.brand.as_str(),
        target.set_name.as_str(),
        target.player_name.as_str(),
        number.as_str(),
    ]
    .iter()
    .map(|p| p.trim())
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Title names the player (by last name) and is not a set, lot or box.
pub fn looks_like_single_player_card(title: &str, player_name: &str) -> bool {
    let title = title.to_lowercase();
    if title.is_empty() {
        return false;
    }
    if let Some(last) = player_name.split_whitespace().last() {
        if !title.contains(&last.to_lowercase()) {
            return false;
        }
    }
    !BAD_TITLE_KEYWORDS.iter().any(|bad| title.contains(bad))
}

/// Prefer a single-player listing; otherwise take the first listing with any image.
pub fn choose_image(items: &[ItemSummary], player_name: &str) -> Option<String> {
    items
        .iter()
        .filter(|item| {
            item.title
                .as_deref()
                .is_some_and(|t| looks_like_single_player_card(t, player_name))
        })
        .find_map(ItemSummary::image_url)
        .or_else(|| items.iter().find_map(ItemSummary::image_url))
        .map(str::to_string)
}

// ── Backfill ──

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub checked: usize,
    pub updated: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BackfillReport {
    pub fn print(&self) {
        println!(
            "Checked {} cards: {} updated, {} without a usable image, {} failed lookups.",
            self.checked, self.updated, self.not_found, self.failed
        );
    }
}

/// Fill card images from marketplace listings. Lookup failures leave the
/// card unchanged; only storage errors stop the batch.
pub async fn backfill_images(
    conn: &Connection,
    client: &MarketplaceClient,
    only_missing: bool,
    limit: Option<usize>,
    pause: Duration,
) -> Result<BackfillReport> {
    let targets = db::fetch_image_targets(conn, only_missing, limit)?;
    let mut report = BackfillReport::default();
    if targets.is_empty() {
        return Ok(report);
    }
    info!("Looking up images for {} cards", targets.len());

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    for (i, target) in targets.iter().enumerate() {
        report.checked += 1;
        match client.find_image(target).await {
            Ok(Some(url)) => {
                db::update_card_image(conn, target.id, &url)?;
                report.updated += 1;
            }
            Ok(None) => {
                debug!(card_id = target.id, "no usable marketplace image");
                report.not_found += 1;
            }
            Err(e) => {
                warn!(card_id = target.id, "image lookup failed: {}", e);
                report.failed += 1;
            }
        }
        pb.inc(1);
        if i + 1 < targets.len() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    pb.finish_and_clear();
    Ok(report)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn target(player: &str) -> ImageTarget {
        ImageTarget {
            id: 1,
            year: "2024-25".into(),
            brand: "Upper Deck".into(),
            set_name: "Young Guns".into(),
            card_number: "201".into(),
            player_name: player.into(),
        }
    }

    fn items(json: &str) -> Vec<ItemSummary> {
        serde_json::from_str::<SearchResponse>(json)
            .unwrap()
            .item_summaries
    }

    #[test]
    fn query_from_catalog_fields() {
        assert_eq!(
            build_query(&target("Lane Hutson")),
            "2024-25 Upper Deck Young Guns Lane Hutson #201"
        );
        let sparse = ImageTarget {
            brand: String::new(),
            card_number: String::new(),
            ..target("Lane Hutson")
        };
        assert_eq!(build_query(&sparse), "2024-25 Young Guns Lane Hutson");
    }

    #[test]
    fn single_card_heuristic() {
        assert!(looks_like_single_player_card(
            "2024-25 Upper Deck Young Guns #201 Lane HUTSON RC",
            "Lane Hutson"
        ));
        assert!(!looks_like_single_player_card(
            "2024-25 Upper Deck Canadiens Team Set Hutson",
            "Lane Hutson"
        ));
        assert!(!looks_like_single_player_card("Young Guns Suzuki", "Lane Hutson"));
        assert!(!looks_like_single_player_card("", "Lane Hutson"));
    }

    #[test]
    fn prefers_single_player_listing() {
        let found = items(
            r#"{"itemSummaries": [
                {"title": "Hobby box Upper Deck", "image": {"imageUrl": "http://i/box.jpg"}},
                {"title": "Young Guns Hutson #201", "thumbnailImages": [{"imageUrl": "http://i/thumb.jpg"}]},
                {"title": "Young Guns Hutson #201 PSA 10", "image": {"imageUrl": "http://i/psa.jpg"}}
            ]}"#,
        );
        assert_eq!(
            choose_image(&found, "Lane Hutson").as_deref(),
            Some("http://i/thumb.jpg")
        );
    }

    #[test]
    fn falls_back_to_any_image() {
        let found = items(
            r#"{"itemSummaries": [
                {"title": "Card lot of 50"},
                {"title": "Mixed lot", "image": {"imageUrl": "http://i/lot.jpg"}}
            ]}"#,
        );
        assert_eq!(choose_image(&found, "Lane Hutson").as_deref(), Some("http://i/lot.jpg"));
        assert!(choose_image(&items("{}"), "Lane Hutson").is_none());
    }

    #[test]
    fn empty_main_image_uses_thumbnail() {
        let found = items(
            r#"{"itemSummaries": [
                {"title": "Young Guns Hutson #201",
                 "image": {"imageUrl": ""},
                 "thumbnailImages": [{"imageUrl": "http://i/thumb.jpg"}]}
            ]}"#,
        );
        assert_eq!(
            choose_image(&found, "Lane Hutson").as_deref(),
            Some("http://i/thumb.jpg")
        );
    }

    #[test]
    fn missing_token_is_rejected() {
        let settings = Settings {
            ebay_token: Some("  ".into()),
            ..Settings::default()
        };
        assert!(matches!(
            MarketplaceClient::from_settings(&settings),
            Err(LookupError::MissingToken)
        ));
    }

    #[test]
    fn retry_only_on_busy_responses() {
        let busy = LookupError::Status { status: 429, body: String::new() };
        let down = LookupError::Status { status: 503, body: String::new() };
        let denied = LookupError::Status { status: 401, body: String::new() };
        assert!(busy.is_retryable());
        assert!(down.is_retryable());
        assert!(!denied.is_retryable());
    }
}
