//! Token exchange service: the credential lifecycle for one user.
//!
//! Owns the full refresh path — load credentials, validate shape,
//! exchange with the marketplace, cache — plus connection-status
//! classification, disconnect, and a single bounded recovery policy.
//! Every failure is a typed [`TokenError`]; nothing here panics or
//! returns a bare string.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use repricer_core::error::TokenError;
use repricer_core::types::{ConnectionStatus, DbId, Timestamp};
use repricer_core::vault::{Vault, VaultError};
use repricer_db::models::account::MarketplaceAccount;
use repricer_db::repositories::AccountRepo;

use crate::cache::TokenCache;
use crate::config::EbayConfig;
use crate::oauth::TokenExchanger;

/// Shortest plausible app ID.
const MIN_APP_ID_LENGTH: usize = 10;

/// Expected decrypted cert ID length.
const MIN_CERT_ID_LENGTH: usize = 32;

/// Expected minimum refresh token length.
const MIN_REFRESH_TOKEN_LENGTH: usize = 50;

/// Fixed delay before the single recovery retry of a transient error.
const RECOVERY_RETRY_DELAY: StdDuration = StdDuration::from_secs(5);

/// Decrypted, resolved credentials for one user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub app_id: String,
    pub cert_id: String,
    pub refresh_token: String,
    pub ebay_user_id: Option<String>,
    pub connection_status: ConnectionStatus,
    pub connected_at: Option<Timestamp>,
}

/// User-facing summary of account usability; never an error.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionSummary {
    pub connected: bool,
    pub has_credentials: bool,
    pub can_sync: bool,
    pub issues: Vec<String>,
}

impl ConnectionSummary {
    /// Classify the outcome of one full token path.
    fn from_token_result(result: &Result<String, TokenError>) -> Self {
        match result {
            Ok(_) => Self {
                connected: true,
                has_credentials: true,
                can_sync: true,
                issues: Vec::new(),
            },
            Err(err) => {
                let has_credentials = !matches!(err, TokenError::CredentialsNotConfigured);
                Self {
                    connected: false,
                    has_credentials,
                    can_sync: false,
                    issues: vec![format!("{err} [{}]", err.code())],
                }
            }
        }
    }
}

/// Access-token lifecycle for a single user id.
///
/// Cheap to construct per user per pass; the heavyweight pieces (pool,
/// vault, OAuth client, cache, config) are shared via `Arc`/clone.
pub struct TokenService {
    user_id: DbId,
    pool: PgPool,
    vault: Arc<Vault>,
    oauth: Arc<dyn TokenExchanger>,
    cache: Arc<TokenCache>,
    config: Arc<EbayConfig>,
}

impl TokenService {
    pub fn new(
        user_id: DbId,
        pool: PgPool,
        vault: Arc<Vault>,
        oauth: Arc<dyn TokenExchanger>,
        cache: Arc<TokenCache>,
        config: Arc<EbayConfig>,
    ) -> Self {
        Self {
            user_id,
            pool,
            vault,
            oauth,
            cache,
            config,
        }
    }

    /// A valid access token for this user.
    ///
    /// Returns the cached token while it is comfortably inside its TTL;
    /// otherwise runs the full refresh path under the per-user
    /// single-flight lock, re-checking the cache after acquisition so a
    /// refresh that raced ahead of us is reused, not repeated.
    pub async fn get_access_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cache.get(self.user_id, Utc::now()).await {
            return Ok(token);
        }

        let lock = self.cache.refresh_lock(self.user_id).await;
        let _guard = lock.lock().await;
        if let Some(token) = self.cache.get(self.user_id, Utc::now()).await {
            return Ok(token);
        }

        let creds = self.get_credentials().await?;
        validate_credentials(&creds)?;

        let token = self
            .oauth
            .exchange(&creds.app_id, &creds.cert_id, &creds.refresh_token)
            .await?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        self.cache
            .insert(self.user_id, token.access_token.clone(), expires_at)
            .await;
        tracing::debug!(
            user_id = self.user_id,
            expires_in = token.expires_in,
            "Access token refreshed"
        );

        Ok(token.access_token)
    }

    /// Load and decrypt this user's credentials in one lookup.
    pub async fn get_credentials(&self) -> Result<Credentials, TokenError> {
        let account = AccountRepo::find_by_user(&self.pool, self.user_id)
            .await
            .map_err(storage_error)?;

        let (app_id, cert_id) = self.resolve_app_credentials(account.as_ref())?;

        let account = account.ok_or(TokenError::NotConnected)?;
        let refresh_token_enc = account
            .refresh_token_enc
            .as_deref()
            .ok_or(TokenError::NotConnected)?;
        let refresh_token = self
            .vault
            .decrypt(refresh_token_enc)
            .map_err(vault_error)?;

        Ok(Credentials {
            app_id,
            cert_id,
            refresh_token,
            ebay_user_id: account.ebay_user_id.clone(),
            connection_status: account.status(),
            connected_at: account.connected_at,
        })
    }

    /// App credential precedence: the user's own stored credentials
    /// first, then the platform defaults from config.
    fn resolve_app_credentials(
        &self,
        account: Option<&MarketplaceAccount>,
    ) -> Result<(String, String), TokenError> {
        if let Some(acc) = account {
            if let (Some(app_enc), Some(cert_enc)) = (&acc.app_id_enc, &acc.cert_id_enc) {
                let app_id = self.vault.decrypt(app_enc).map_err(vault_error)?;
                let cert_id = self.vault.decrypt(cert_enc).map_err(vault_error)?;
                return Ok((app_id, cert_id));
            }
        }

        match (&self.config.default_app_id, &self.config.default_cert_id) {
            (Some(app_id), Some(cert_id)) => Ok((app_id.clone(), cert_id.clone())),
            _ => Err(TokenError::CredentialsNotConfigured),
        }
    }

    /// Classify the account's usability without erroring.
    pub async fn connection_status(&self) -> ConnectionSummary {
        ConnectionSummary::from_token_result(&self.get_access_token().await)
    }

    /// Clear token and connection fields and evict the cached access
    /// token. App credentials are preserved so the user can reconnect
    /// without re-entering them.
    pub async fn disconnect(&self) -> Result<(), TokenError> {
        AccountRepo::disconnect(&self.pool, self.user_id)
            .await
            .map_err(storage_error)?;
        self.cache.evict(self.user_id).await;
        tracing::info!(user_id = self.user_id, "Marketplace account disconnected");
        Ok(())
    }

    /// Single bounded recovery attempt for a failed token path.
    ///
    /// Transient errors get exactly one retry after a fixed delay.
    /// Credential-shape errors are never retried — stored malformed
    /// values require user action. An auth failure additionally checks
    /// the refresh-token age heuristic and marks the account `expired`
    /// rather than leaving it `connected`.
    pub async fn attempt_recovery(&self, error: &TokenError) -> bool {
        match error {
            TokenError::ApiError { .. } | TokenError::Network(_) | TokenError::Storage(_) => {
                tokio::time::sleep(RECOVERY_RETRY_DELAY).await;
                match self.get_access_token().await {
                    Ok(_) => {
                        tracing::info!(user_id = self.user_id, "Token recovery succeeded");
                        true
                    }
                    Err(err) => {
                        tracing::warn!(
                            user_id = self.user_id,
                            error = %err,
                            "Token recovery retry failed"
                        );
                        false
                    }
                }
            }
            TokenError::AuthFailed { .. } => {
                self.expire_if_past_horizon().await;
                false
            }
            _ => false,
        }
    }

    /// If `connected_at` exceeds the refresh-token validity horizon,
    /// flip the account to `expired`.
    async fn expire_if_past_horizon(&self) {
        let account = match AccountRepo::find_by_user(&self.pool, self.user_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(
                    user_id = self.user_id,
                    error = %err,
                    "Could not load account during recovery"
                );
                return;
            }
        };

        let Some(connected_at) = account.connected_at else {
            return;
        };

        let age = Utc::now() - connected_at;
        if age > Duration::days(self.config.refresh_token_max_age_days) {
            tracing::info!(
                user_id = self.user_id,
                age_days = age.num_days(),
                "Refresh token past its validity horizon, marking account expired"
            );
            if let Err(err) =
                AccountRepo::set_status(&self.pool, self.user_id, ConnectionStatus::Expired).await
            {
                tracing::error!(
                    user_id = self.user_id,
                    error = %err,
                    "Failed to mark account expired"
                );
            }
        }
    }
}

/// Reject credentials whose decrypted shape cannot be valid.
///
/// Malformed stored values are not self-healing, so every rejection
/// carries the disconnect-and-reconnect remedy.
pub fn validate_credentials(creds: &Credentials) -> Result<(), TokenError> {
    if creds.app_id.len() < MIN_APP_ID_LENGTH {
        return Err(TokenError::InvalidAppId);
    }
    if creds.cert_id.len() < MIN_CERT_ID_LENGTH {
        return Err(TokenError::InvalidCertId);
    }
    if creds.refresh_token.len() < MIN_REFRESH_TOKEN_LENGTH {
        return Err(TokenError::InvalidRefreshToken);
    }
    Ok(())
}

fn vault_error(err: VaultError) -> TokenError {
    match err {
        VaultError::NeedsMigration => TokenError::NeedsMigration,
        VaultError::InvalidFormat => TokenError::InvalidEncryptionFormat,
        VaultError::DecryptFailed => TokenError::DecryptionFailed,
    }
}

fn storage_error(err: sqlx::Error) -> TokenError {
    TokenError::Storage(err.to_string())
}
