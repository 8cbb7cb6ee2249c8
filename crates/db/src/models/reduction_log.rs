//! Reduction outcome log entity model.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use repricer_core::types::{DbId, Timestamp};

/// Outcome of one engine decision against one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionOutcome {
    /// Price update accepted by the marketplace and persisted.
    Applied,
    /// No trigger fired; nothing touched.
    Skipped,
    /// Token or marketplace call failed; retried next pass.
    Failed,
}

impl ReductionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionOutcome::Applied => "applied",
            ReductionOutcome::Skipped => "skipped",
            ReductionOutcome::Failed => "failed",
        }
    }
}

/// A row from the `reduction_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReductionLog {
    pub id: DbId,
    pub listing_id: DbId,
    pub user_id: DbId,
    pub old_price: Decimal,
    pub new_price: Option<Decimal>,
    /// Trigger reason text, e.g. `time trigger` or `low interest`.
    pub reason: Option<String>,
    /// One of `applied`, `skipped`, `failed`.
    pub outcome: String,
    /// Machine-readable error code when `outcome` is `failed`.
    pub error_code: Option<String>,
    pub created_at: Timestamp,
}

/// Insert DTO for one log row.
#[derive(Debug, Clone)]
pub struct NewReductionLog {
    pub listing_id: DbId,
    pub user_id: DbId,
    pub old_price: Decimal,
    pub new_price: Option<Decimal>,
    pub reason: Option<String>,
    pub outcome: ReductionOutcome,
    pub error_code: Option<String>,
}
