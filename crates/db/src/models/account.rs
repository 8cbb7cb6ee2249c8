//! Marketplace account entity model.

use serde::Serialize;
use sqlx::FromRow;

use repricer_core::types::{ConnectionStatus, DbId, Timestamp};

/// A row from the `marketplace_accounts` table — one per user.
///
/// The `*_enc` fields are vault ciphertext (`nonce:payload` hex), never
/// plaintext, and are skipped during serialization to prevent exposure.
/// Invariant: `refresh_token_enc` is present iff `connection_status` is
/// `connected`; app credentials may exist without a refresh token
/// (configured but not yet authorized).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MarketplaceAccount {
    pub id: DbId,
    pub user_id: DbId,
    /// Encrypted app ID of the user's own API application.
    #[serde(skip_serializing)]
    pub app_id_enc: Option<String>,
    /// Encrypted cert ID of the user's own API application.
    #[serde(skip_serializing)]
    pub cert_id_enc: Option<String>,
    /// Encrypted long-lived refresh token from the authorization callback.
    #[serde(skip_serializing)]
    pub refresh_token_enc: Option<String>,
    /// One of `disconnected`, `connected`, `expired`.
    pub connection_status: String,
    /// When the last successful authorization happened.
    pub connected_at: Option<Timestamp>,
    /// External marketplace account name, display only.
    pub ebay_user_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MarketplaceAccount {
    /// Parsed connection status; unknown text degrades to disconnected.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::parse(&self.connection_status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    /// Whether the user has supplied their own app credentials.
    pub fn has_app_credentials(&self) -> bool {
        self.app_id_enc.is_some() && self.cert_id_enc.is_some()
    }
}
