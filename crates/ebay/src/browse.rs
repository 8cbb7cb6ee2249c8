//! Competitive price search over the eBay Browse API.
//!
//! A three-tier waterfall tries increasingly broad match criteria until
//! a tier yields enough samples: exact GTIN, title keywords within the
//! listing's category, then title keywords alone. The [`CatalogSource`]
//! trait is the seam between the waterfall logic and the HTTP client so
//! the tier behavior is testable with canned data.
//!
//! Search failures never propagate: market data is an enrichment, and a
//! broken tier simply contributes zero samples.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use repricer_core::market::{
    drop_outliers, drop_own_listings, extract_keywords, CompetitorSample, MarketStats, MatchTier,
    MIN_TIER_SAMPLES,
};

use crate::retry::{is_retryable_status, next_delay, RetryConfig};

/// Maximum results requested per catalog query.
const SEARCH_LIMIT: u32 = 50;

/// What the waterfall knows about the listing being priced.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    /// Exact product code, when the listing carries one.
    pub gtin: Option<String>,
    pub title: String,
    pub category_id: Option<String>,
    /// The owner's marketplace user name; their own listings are
    /// dropped from the samples.
    pub seller_id: String,
}

/// A failure inside one catalog query.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("catalog search error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    #[error("network error during catalog search: {0}")]
    Network(String),
}

/// One tier's worth of raw catalog results.
#[async_trait]
pub trait CatalogSource {
    async fn search_by_gtin(&self, gtin: &str) -> Result<Vec<CompetitorSample>, SearchError>;

    async fn search_by_keywords(
        &self,
        keywords: &[String],
        category_id: Option<&str>,
    ) -> Result<Vec<CompetitorSample>, SearchError>;
}

/// Run the tiered waterfall and summarize the surviving samples.
///
/// Stops at the first tier yielding at least [`MIN_TIER_SAMPLES`] raw
/// samples; a tier with zero samples always falls through. When every
/// tier stays under the threshold, the tier that yielded the most
/// samples wins (the earlier tier on ties, being the more precise
/// match). All tiers empty means [`MatchTier::NoMatches`].
pub async fn waterfall_search<S: CatalogSource>(source: &S, target: &SearchTarget) -> MarketStats {
    let keywords = extract_keywords(&target.title);
    let mut best: Option<(MatchTier, Vec<CompetitorSample>)> = None;

    for tier in [MatchTier::Gtin, MatchTier::TitleCategory, MatchTier::TitleOnly] {
        let result = match tier {
            MatchTier::Gtin => match &target.gtin {
                Some(gtin) => source.search_by_gtin(gtin).await,
                None => continue,
            },
            MatchTier::TitleCategory => match &target.category_id {
                Some(category) if !keywords.is_empty() => {
                    source.search_by_keywords(&keywords, Some(category)).await
                }
                _ => continue,
            },
            MatchTier::TitleOnly => {
                if keywords.is_empty() {
                    continue;
                }
                source.search_by_keywords(&keywords, None).await
            }
            MatchTier::NoMatches => continue,
        };

        let samples = match result {
            Ok(samples) => samples,
            Err(err) => {
                tracing::warn!(
                    tier = tier.as_str(),
                    error = %err,
                    "Catalog search tier failed, treating as empty"
                );
                Vec::new()
            }
        };

        if samples.is_empty() {
            continue;
        }
        if samples.len() >= MIN_TIER_SAMPLES {
            best = Some((tier, samples));
            break;
        }
        // Under the threshold: remember it, but keep falling through in
        // case a broader tier does better.
        if best.as_ref().map_or(true, |(_, b)| samples.len() > b.len()) {
            best = Some((tier, samples));
        }
    }

    match best {
        None => MarketStats::no_matches(),
        Some((tier, raw)) => {
            let filtered = drop_outliers(drop_own_listings(raw, &target.seller_id));
            MarketStats::from_samples(tier, &filtered)
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Browse API item summary payload (the fields we read).
#[derive(Debug, Deserialize)]
struct ItemSummariesBody {
    #[serde(rename = "itemSummaries", default)]
    item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    price: Option<ItemPrice>,
    seller: Option<ItemSeller>,
}

#[derive(Debug, Deserialize)]
struct ItemPrice {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ItemSeller {
    username: Option<String>,
}

/// reqwest-backed [`CatalogSource`] holding one bearer token — either a
/// user access token or an app-level token, whichever the caller has.
pub struct BrowseClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    retry: RetryConfig,
}

impl BrowseClient {
    pub fn new(
        base_url: String,
        bearer_token: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            bearer_token,
            retry: RetryConfig::default(),
        })
    }

    async fn search(&self, query: &[(&str, String)]) -> Result<Vec<CompetitorSample>, SearchError> {
        let url = format!("{}/buy/browse/v1/item_summary/search", self.base_url);
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.request(&url, query).await {
                Ok(samples) => return Ok(samples),
                Err(err) => {
                    let retryable = match &err {
                        SearchError::Network(_) => true,
                        SearchError::Http { status, .. } => is_retryable_status(*status),
                    };
                    if !retryable || attempt >= self.retry.max_attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Catalog search failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                }
            }
        }
    }

    async fn request(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<CompetitorSample>, SearchError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Http { status, message });
        }

        let body: ItemSummariesBody = response
            .json()
            .await
            .map_err(|e| SearchError::Network(format!("unparseable search response: {e}")))?;

        Ok(body
            .item_summaries
            .into_iter()
            .filter_map(|item| {
                let price = Decimal::from_str(&item.price?.value).ok()?;
                let seller_id = item.seller.and_then(|s| s.username).unwrap_or_default();
                Some(CompetitorSample { price, seller_id })
            })
            .collect())
    }
}

#[async_trait]
impl CatalogSource for BrowseClient {
    async fn search_by_gtin(&self, gtin: &str) -> Result<Vec<CompetitorSample>, SearchError> {
        self.search(&[
            ("gtin", gtin.to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ])
        .await
    }

    async fn search_by_keywords(
        &self,
        keywords: &[String],
        category_id: Option<&str>,
    ) -> Result<Vec<CompetitorSample>, SearchError> {
        let mut query = vec![
            ("q", keywords.join(" ")),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        if let Some(category) = category_id {
            query.push(("category_ids", category.to_string()));
        }
        self.search(&query).await
    }
}
