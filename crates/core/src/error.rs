//! Typed failure taxonomy for the credential and token lifecycle.
//!
//! Every failure in the vault or the token exchange path is one of these
//! variants. Each carries a stable machine-readable code plus a
//! [`RecommendedAction`] so callers render a call to action instead of a
//! raw error, and never have to string-match on messages.

use thiserror::Error;

/// What the user (or the UI on their behalf) should do about a
/// [`TokenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    /// App credentials were never configured; start at the setup page.
    GoToSetup,
    /// App credentials exist but the account was never authorized.
    ConnectAccount,
    /// Stored credentials are malformed or rejected; re-authorization is
    /// the only fix.
    DisconnectAndReconnect,
    /// Transient marketplace or network trouble; nothing to fix locally.
    TryAgainLater,
    /// Stored data is unreadable in a way reconnecting will not fix.
    ContactSupport,
}

/// A structured credential/token failure.
///
/// Closed enumeration: downstream code matches on variants, not on
/// message text. Shape errors (`InvalidAppId` and friends) are never
/// retried because stored malformed values are not self-healing; only
/// [`ApiError`](TokenError::ApiError) and
/// [`Network`](TokenError::Network) are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No app credentials on the account row and no platform default.
    #[error("eBay app credentials are not configured")]
    CredentialsNotConfigured,

    /// App credentials exist but there is no refresh token.
    #[error("eBay account is not connected")]
    NotConnected,

    /// Ciphertext carries the legacy-format marker and must be migrated.
    #[error("stored credentials use a legacy encryption format")]
    NeedsMigration,

    /// Ciphertext does not match the expected `iv:payload` hex shape.
    #[error("stored credential ciphertext is malformed")]
    InvalidEncryptionFormat,

    /// Ciphertext has the right shape but cannot be decrypted with the
    /// current key.
    #[error("stored credential could not be decrypted")]
    DecryptionFailed,

    /// Decrypted app ID is too short to be plausible.
    #[error("stored app ID is too short to be valid")]
    InvalidAppId,

    /// Decrypted cert ID is shorter than the expected secret length.
    #[error("stored cert ID is too short to be valid")]
    InvalidCertId,

    /// Decrypted refresh token is shorter than the expected minimum.
    #[error("stored refresh token is too short to be valid")]
    InvalidRefreshToken,

    /// The marketplace rejected the credentials (HTTP 401).
    #[error("eBay rejected the stored credentials: {description}")]
    AuthFailed { description: String },

    /// The marketplace rejected the request itself (HTTP 400).
    #[error("eBay rejected the token request: {description}")]
    InvalidRequest { description: String },

    /// Any other non-2xx marketplace response.
    #[error("eBay API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Transport-level failure (connection reset, timeout, DNS).
    #[error("network error talking to eBay: {0}")]
    Network(String),

    /// Credential store read/write failure.
    #[error("credential store error: {0}")]
    Storage(String),
}

impl TokenError {
    /// Stable machine-readable code for logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::CredentialsNotConfigured => "CREDENTIALS_NOT_CONFIGURED",
            TokenError::NotConnected => "NOT_CONNECTED",
            TokenError::NeedsMigration => "NEEDS_MIGRATION",
            TokenError::InvalidEncryptionFormat => "INVALID_ENCRYPTION_FORMAT",
            TokenError::DecryptionFailed => "DECRYPTION_FAILED",
            TokenError::InvalidAppId => "INVALID_APP_ID",
            TokenError::InvalidCertId => "INVALID_CERT_ID",
            TokenError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            TokenError::AuthFailed { .. } => "EBAY_AUTH_FAILED",
            TokenError::InvalidRequest { .. } => "EBAY_INVALID_REQUEST",
            TokenError::ApiError { .. } => "EBAY_API_ERROR",
            TokenError::Network(_) => "NETWORK_ERROR",
            TokenError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// The remedial action surfaced to the user.
    pub fn recommended_action(&self) -> RecommendedAction {
        match self {
            TokenError::CredentialsNotConfigured => RecommendedAction::GoToSetup,
            TokenError::NotConnected => RecommendedAction::ConnectAccount,
            TokenError::NeedsMigration
            | TokenError::InvalidEncryptionFormat
            | TokenError::InvalidAppId
            | TokenError::InvalidCertId
            | TokenError::InvalidRefreshToken
            | TokenError::AuthFailed { .. }
            | TokenError::InvalidRequest { .. } => RecommendedAction::DisconnectAndReconnect,
            TokenError::ApiError { .. } | TokenError::Network(_) | TokenError::Storage(_) => {
                RecommendedAction::TryAgainLater
            }
            TokenError::DecryptionFailed => RecommendedAction::ContactSupport,
        }
    }

    /// Whether a retry without user intervention could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TokenError::ApiError { .. } | TokenError::Network(_) | TokenError::Storage(_)
        )
    }
}
