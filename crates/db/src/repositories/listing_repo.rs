//! Repository for the `listings` table.

use rust_decimal::Decimal;
use sqlx::PgPool;

use repricer_core::types::{DbId, Timestamp};

use crate::models::listing::Listing;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, item_id, title, gtin, category_id, current_price, \
    original_price, minimum_price, currency, reduction_enabled, strategy, reduction_amount, \
    interval_days, trigger_days, watch_threshold, end_time, watch_count, last_reduction_at, \
    next_reduction_at, created_at, updated_at";

/// Read and engine-write operations on managed listings.
///
/// The engine only ever updates price and reduction timestamps; strategy
/// fields belong to the user, and rows are never deleted here.
pub struct ListingRepo;

impl ListingRepo {
    /// Find one listing by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Listing>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM listings WHERE id = $1");
        sqlx::query_as::<_, Listing>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Listings eligible for this scheduler pass: reduction enabled,
    /// still running, and due (never reduced, or past
    /// `next_reduction_at`). Ordered by user so the pass can reuse one
    /// access token per owner.
    pub async fn list_due(pool: &PgPool) -> Result<Vec<Listing>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM listings
             WHERE reduction_enabled = TRUE
               AND end_time > NOW()
               AND (next_reduction_at IS NULL OR next_reduction_at <= NOW())
             ORDER BY user_id, id"
        );
        sqlx::query_as::<_, Listing>(&query).fetch_all(pool).await
    }

    /// Persist an accepted reduction: new price plus both reduction
    /// timestamps, in one statement.
    pub async fn apply_reduction(
        pool: &PgPool,
        id: DbId,
        new_price: Decimal,
        reduced_at: Timestamp,
        next_reduction_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE listings SET
                current_price = $2,
                last_reduction_at = $3,
                next_reduction_at = $4,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(new_price)
        .bind(reduced_at)
        .bind(next_reduction_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Refresh the watch count observed during a marketplace sync.
    pub async fn set_watch_count(
        pool: &PgPool,
        id: DbId,
        watch_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE listings SET watch_count = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(watch_count)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
