//! Repository for the `marketplace_accounts` table.

use sqlx::PgPool;

use repricer_core::types::{ConnectionStatus, DbId};

use crate::models::account::MarketplaceAccount;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, app_id_enc, cert_id_enc, refresh_token_enc, \
    connection_status, connected_at, ebay_user_id, created_at, updated_at";

/// Single-row, single-user operations on marketplace accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Find the account row for a user.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<MarketplaceAccount>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM marketplace_accounts WHERE user_id = $1");
        sqlx::query_as::<_, MarketplaceAccount>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Store (or replace) the user's own app credentials.
    ///
    /// Does not touch token or connection fields: supplying credentials
    /// and authorizing are separate lifecycle steps.
    pub async fn upsert_app_credentials(
        pool: &PgPool,
        user_id: DbId,
        app_id_enc: &str,
        cert_id_enc: &str,
    ) -> Result<MarketplaceAccount, sqlx::Error> {
        let query = format!(
            "INSERT INTO marketplace_accounts (user_id, app_id_enc, cert_id_enc)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET
                app_id_enc = EXCLUDED.app_id_enc,
                cert_id_enc = EXCLUDED.cert_id_enc,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MarketplaceAccount>(&query)
            .bind(user_id)
            .bind(app_id_enc)
            .bind(cert_id_enc)
            .fetch_one(pool)
            .await
    }

    /// Record a successful authorization: refresh token, marketplace
    /// user name, `connected` status, and the connection timestamp.
    pub async fn connect(
        pool: &PgPool,
        user_id: DbId,
        refresh_token_enc: &str,
        ebay_user_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE marketplace_accounts SET
                refresh_token_enc = $2,
                ebay_user_id = $3,
                connection_status = 'connected',
                connected_at = NOW(),
                updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(refresh_token_enc)
        .bind(ebay_user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear token and connection fields only; app credentials survive
    /// so the user can reconnect without re-entering them.
    pub async fn disconnect(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE marketplace_accounts SET
                refresh_token_enc = NULL,
                ebay_user_id = NULL,
                connected_at = NULL,
                connection_status = 'disconnected',
                updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the connection status, e.g. marking a stale refresh
    /// token `expired` during recovery.
    pub async fn set_status(
        pool: &PgPool,
        user_id: DbId,
        status: ConnectionStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE marketplace_accounts SET connection_status = $2, updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
