//! Repository for the `reduction_log` table.

use sqlx::PgPool;

use repricer_core::types::DbId;

use crate::models::reduction_log::{NewReductionLog, ReductionLog};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, listing_id, user_id, old_price, new_price, reason, outcome, error_code, created_at";

/// Append-only log of per-listing engine outcomes.
pub struct ReductionLogRepo;

impl ReductionLogRepo {
    /// Record one decision outcome.
    pub async fn record(pool: &PgPool, entry: &NewReductionLog) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO reduction_log
                (listing_id, user_id, old_price, new_price, reason, outcome, error_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(entry.listing_id)
        .bind(entry.user_id)
        .bind(entry.old_price)
        .bind(entry.new_price)
        .bind(entry.reason.as_deref())
        .bind(entry.outcome.as_str())
        .bind(entry.error_code.as_deref())
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Most recent outcomes for one listing, newest first.
    pub async fn list_for_listing(
        pool: &PgPool,
        listing_id: DbId,
        limit: i64,
    ) -> Result<Vec<ReductionLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM reduction_log
             WHERE listing_id = $1 ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, ReductionLog>(&query)
            .bind(listing_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
