//! Managed listing entity model.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use repricer_core::pricing::{ListingSnapshot, Strategy};
use repricer_core::types::{DbId, Timestamp};

/// A row from the `listings` table — one per marketplace item under
/// management.
///
/// The decision engine mutates price and timestamps; strategy fields are
/// user-owned; the engine never deletes rows. Invariants:
/// `current_price >= minimum_price` after any reduction, and
/// `next_reduction_at` is null while `reduction_enabled` is false.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Listing {
    pub id: DbId,
    pub user_id: DbId,
    /// Marketplace item identifier used in price-update calls.
    pub item_id: String,
    pub title: String,
    /// Global product code for exact catalog matching, when known.
    pub gtin: Option<String>,
    pub category_id: Option<String>,
    pub current_price: Decimal,
    /// Price at import time; anchors the 50% single-evaluation floor.
    pub original_price: Decimal,
    pub minimum_price: Decimal,
    pub currency: String,
    pub reduction_enabled: bool,
    /// One of `fixed_percentage`, `fixed_dollar`, `time_based`,
    /// `market_based`.
    pub strategy: String,
    pub reduction_amount: Decimal,
    pub interval_days: i32,
    /// Per-listing time trigger window; engine default applies when null.
    pub trigger_days: Option<i32>,
    /// Per-listing watch threshold; engine default applies when null.
    pub watch_threshold: Option<i32>,
    pub end_time: Timestamp,
    pub watch_count: i32,
    pub last_reduction_at: Option<Timestamp>,
    pub next_reduction_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Listing {
    /// Detach the engine-facing snapshot from the row.
    ///
    /// `None` when the stored strategy text is unknown — such rows are
    /// skipped (and logged) rather than guessed at.
    pub fn snapshot(&self) -> Option<ListingSnapshot> {
        let strategy = Strategy::parse(&self.strategy)?;
        Some(ListingSnapshot {
            current_price: self.current_price,
            original_price: self.original_price,
            minimum_price: self.minimum_price,
            strategy,
            reduction_amount: self.reduction_amount,
            end_time: self.end_time,
            watch_count: self.watch_count,
            trigger_days: self.trigger_days.map(i64::from),
            watch_threshold: self.watch_threshold,
        })
    }
}
