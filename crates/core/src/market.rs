//! Competitor sample filtering and statistics for market-based pricing.
//!
//! The eBay client crate runs the tiered catalog search; everything that
//! does not need the network lives here so it can be unit tested: title
//! keyword extraction, same-seller filtering, the median-band outlier
//! filter, and the summary statistics handed to the pricing engine.

use rust_decimal::Decimal;

/// A tier is "good enough" once it yields at least this many raw samples.
pub const MIN_TIER_SAMPLES: usize = 5;

/// Outlier filtering is skipped below this many samples: the median of a
/// tiny set is too noisy to band around.
const MIN_SAMPLES_FOR_OUTLIER_FILTER: usize = 3;

/// Maximum number of title keywords sent to the catalog search.
const MAX_KEYWORDS: usize = 5;

/// Words dropped from listing titles before keyword search.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "new", "brand", "free", "shipping",
    "item", "lot", "set", "pack",
];

/// Which waterfall stage produced a set of competitor samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Exact product-code match.
    Gtin,
    /// Title keywords constrained to the listing's category.
    TitleCategory,
    /// Title keywords alone (broadest, last resort).
    TitleOnly,
    /// Every tier came back empty.
    NoMatches,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Gtin => "gtin",
            MatchTier::TitleCategory => "title_category",
            MatchTier::TitleOnly => "title_only",
            MatchTier::NoMatches => "no_matches",
        }
    }
}

/// One competing listing observed in the catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorSample {
    pub price: Decimal,
    pub seller_id: String,
}

/// Summary of the surviving samples from one analysis call.
///
/// All price fields are `None` when `tier` is
/// [`MatchTier::NoMatches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketStats {
    pub tier: MatchTier,
    pub median: Option<Decimal>,
    pub average: Option<Decimal>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub sample_count: usize,
    /// Set when fewer than [`MIN_TIER_SAMPLES`] samples survived
    /// filtering; market-based pricing falls back to its percentage
    /// formula in that case.
    pub has_insufficient_data: bool,
}

impl MarketStats {
    /// The empty result: every tier exhausted with zero matches.
    pub fn no_matches() -> Self {
        Self {
            tier: MatchTier::NoMatches,
            median: None,
            average: None,
            min: None,
            max: None,
            sample_count: 0,
            has_insufficient_data: true,
        }
    }

    /// Summarize filtered samples from the given tier.
    pub fn from_samples(tier: MatchTier, samples: &[CompetitorSample]) -> Self {
        if samples.is_empty() {
            return Self::no_matches();
        }

        let mut prices: Vec<Decimal> = samples.iter().map(|s| s.price).collect();
        prices.sort_unstable();

        let count = prices.len();
        let sum: Decimal = prices.iter().copied().sum();
        let average = (sum / Decimal::from(count)).round_dp(2);

        Self {
            tier,
            median: Some(median_of_sorted(&prices)),
            average: Some(average),
            min: prices.first().copied(),
            max: prices.last().copied(),
            sample_count: count,
            has_insufficient_data: count < MIN_TIER_SAMPLES,
        }
    }
}

/// Extract up to [`MAX_KEYWORDS`] search keywords from a listing title.
///
/// Punctuation is stripped, stop words and words of length <= 2 are
/// dropped, and the result is lowercased.
pub fn extract_keywords(title: &str) -> Vec<String> {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Drop samples that belong to the listing owner themselves.
///
/// An unknown owner id skips the filter entirely: catalog results can
/// come back without a seller name (also stored as the empty string),
/// and those must not be mistaken for the owner's listings.
pub fn drop_own_listings(samples: Vec<CompetitorSample>, own_seller_id: &str) -> Vec<CompetitorSample> {
    if own_seller_id.is_empty() {
        return samples;
    }
    samples
        .into_iter()
        .filter(|s| s.seller_id != own_seller_id)
        .collect()
}

/// Drop price outliers using a median-based band.
///
/// With fewer than [`MIN_SAMPLES_FOR_OUTLIER_FILTER`] samples the input
/// is returned unchanged; otherwise only prices inside
/// `[0.3 * median, 3 * median]` survive.
pub fn drop_outliers(samples: Vec<CompetitorSample>) -> Vec<CompetitorSample> {
    if samples.len() < MIN_SAMPLES_FOR_OUTLIER_FILTER {
        return samples;
    }

    let mut prices: Vec<Decimal> = samples.iter().map(|s| s.price).collect();
    prices.sort_unstable();
    let median = median_of_sorted(&prices);

    let lower = median * Decimal::new(3, 1); // 0.3 * median
    let upper = median * Decimal::from(3);

    samples
        .into_iter()
        .filter(|s| s.price >= lower && s.price <= upper)
        .collect()
}

/// Median of an already-sorted, non-empty price slice.
fn median_of_sorted(prices: &[Decimal]) -> Decimal {
    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        prices[mid]
    } else {
        (prices[mid - 1] + prices[mid]) / Decimal::from(2)
    }
}
