//! eBay client configuration loaded from environment variables.

use std::time::Duration;

/// Endpoints, platform-default credentials, and tuning knobs for all
/// marketplace-facing calls. Resolved once at startup and passed by
/// reference; nothing below this layer reads the environment.
#[derive(Debug, Clone)]
pub struct EbayConfig {
    /// OAuth token endpoint for the refresh-token exchange.
    pub oauth_token_url: String,
    /// Base URL for Browse (catalog search) and price-update calls.
    pub api_base_url: String,
    /// Platform-default app ID, used when the user has not supplied
    /// their own app credentials.
    pub default_app_id: Option<String>,
    /// Platform-default cert ID, paired with `default_app_id`.
    pub default_cert_id: Option<String>,
    /// Per-request timeout for every marketplace call.
    pub http_timeout: Duration,
    /// Minimum spacing between marketplace calls from this process.
    pub call_spacing: Duration,
    /// Heuristic refresh-token validity horizon. eBay does not report an
    /// authoritative expiry, so a token whose `connected_at` is older
    /// than this is treated as expired when an auth error occurs.
    pub refresh_token_max_age_days: i64,
}

impl EbayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                                       |
    /// |------------------------------|-----------------------------------------------|
    /// | `EBAY_OAUTH_TOKEN_URL`       | `https://api.ebay.com/identity/v1/oauth2/token` |
    /// | `EBAY_API_BASE_URL`          | `https://api.ebay.com`                        |
    /// | `EBAY_DEFAULT_APP_ID`        | unset                                         |
    /// | `EBAY_DEFAULT_CERT_ID`       | unset                                         |
    /// | `HTTP_TIMEOUT_SECS`          | `30`                                          |
    /// | `EBAY_CALL_SPACING_MS`       | `200`                                         |
    /// | `REFRESH_TOKEN_MAX_AGE_DAYS` | `540`                                         |
    pub fn from_env() -> Self {
        let oauth_token_url = std::env::var("EBAY_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://api.ebay.com/identity/v1/oauth2/token".into());

        let api_base_url =
            std::env::var("EBAY_API_BASE_URL").unwrap_or_else(|_| "https://api.ebay.com".into());

        let default_app_id = std::env::var("EBAY_DEFAULT_APP_ID").ok().filter(|s| !s.is_empty());
        let default_cert_id = std::env::var("EBAY_DEFAULT_CERT_ID").ok().filter(|s| !s.is_empty());

        let http_timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HTTP_TIMEOUT_SECS must be a valid u64");

        let call_spacing_ms: u64 = std::env::var("EBAY_CALL_SPACING_MS")
            .unwrap_or_else(|_| "200".into())
            .parse()
            .expect("EBAY_CALL_SPACING_MS must be a valid u64");

        let refresh_token_max_age_days: i64 = std::env::var("REFRESH_TOKEN_MAX_AGE_DAYS")
            .unwrap_or_else(|_| "540".into())
            .parse()
            .expect("REFRESH_TOKEN_MAX_AGE_DAYS must be a valid i64");

        Self {
            oauth_token_url,
            api_base_url,
            default_app_id,
            default_cert_id,
            http_timeout: Duration::from_secs(http_timeout_secs),
            call_spacing: Duration::from_millis(call_spacing_ms),
            refresh_token_max_age_days,
        }
    }
}
