//! Refresh-token exchange against the eBay OAuth token endpoint.
//!
//! One HTTPS POST with HTTP Basic auth built from `app_id:cert_id` and a
//! `grant_type=refresh_token` form body. Marketplace HTTP statuses map
//! onto the [`TokenError`] taxonomy; 429/5xx and transport failures are
//! retried with exponential backoff, other 4xx are not.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use repricer_core::error::TokenError;

use crate::retry::{is_retryable_status, next_delay, RetryConfig};

/// The refresh-token exchange, as a seam so the token service can be
/// exercised with an in-memory implementation.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        app_id: &str,
        cert_id: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, TokenError>;
}

/// Successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token TTL in seconds, typically ~7200.
    pub expires_in: i64,
}

/// Failure token-endpoint response body.
#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

impl ErrorBody {
    fn description(&self, status: u16) -> String {
        match (&self.error, &self.error_description) {
            (Some(e), Some(d)) => format!("{e}: {d}"),
            (Some(e), None) => e.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => format!("HTTP {status} with no error body"),
        }
    }
}

/// Client for the OAuth token endpoint.
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    retry: RetryConfig,
}

impl OAuthClient {
    /// Build a client with a per-request timeout.
    pub fn new(token_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token_url,
            retry: RetryConfig::default(),
        })
    }

    async fn request(
        &self,
        app_id: &str,
        cert_id: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, TokenError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(app_id, Some(cert_id))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return response.json::<TokenResponse>().await.map_err(|e| {
                TokenError::ApiError {
                    status,
                    message: format!("unparseable token response: {e}"),
                }
            });
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(map_error_status(status, &body))
    }
}

#[async_trait]
impl TokenExchanger for OAuthClient {
    /// Exchange a refresh token for a short-lived access token.
    ///
    /// Retries transient failures per [`RetryConfig`]; the final error is
    /// returned typed, never panicked on.
    async fn exchange(
        &self,
        app_id: &str,
        cert_id: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, TokenError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.request(app_id, cert_id, refresh_token).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    let retryable = match &err {
                        TokenError::Network(_) => true,
                        TokenError::ApiError { status, .. } => is_retryable_status(*status),
                        _ => false,
                    };
                    if !retryable || attempt >= self.retry.max_attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Token exchange failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                }
            }
        }
    }
}

/// Map a non-2xx token-endpoint status onto the error taxonomy.
///
/// 401 means the credentials themselves were rejected (reconnect); 400
/// means the request was malformed, which for a fixed-shape exchange
/// also points at stale stored values (reconnect); everything else is
/// transient marketplace trouble (retry later).
fn map_error_status(status: u16, body: &ErrorBody) -> TokenError {
    let description = body.description(status);
    match status {
        401 => TokenError::AuthFailed { description },
        400 => TokenError::InvalidRequest { description },
        _ => TokenError::ApiError {
            status,
            message: description,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn body(error: &str, description: &str) -> ErrorBody {
        ErrorBody {
            error: Some(error.into()),
            error_description: Some(description.into()),
        }
    }

    #[test]
    fn unauthorized_maps_to_auth_failed() {
        let err = map_error_status(401, &body("invalid_grant", "refresh token revoked"));
        assert_matches!(
            &err,
            TokenError::AuthFailed { description } if description.contains("invalid_grant")
        );
        assert_eq!(err.code(), "EBAY_AUTH_FAILED");
        assert_eq!(
            err.recommended_action(),
            repricer_core::error::RecommendedAction::DisconnectAndReconnect
        );
    }

    #[test]
    fn bad_request_maps_to_invalid_request() {
        let err = map_error_status(400, &body("invalid_request", "missing refresh_token"));
        assert_eq!(err.code(), "EBAY_INVALID_REQUEST");
    }

    #[test]
    fn other_statuses_map_to_api_error() {
        for status in [403, 429, 500, 503] {
            let err = map_error_status(status, &ErrorBody::default());
            assert_matches!(err, TokenError::ApiError { status: s, .. } if s == status);
        }
    }

    #[test]
    fn missing_error_body_still_describes_status() {
        let err = map_error_status(503, &ErrorBody::default());
        assert_matches!(
            err,
            TokenError::ApiError { message, .. } if message.contains("503")
        );
    }

    #[test]
    fn success_body_parses() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"v^1.1#abc","expires_in":7200,"token_type":"User Access Token"}"#)
                .unwrap();
        assert_eq!(parsed.access_token, "v^1.1#abc");
        assert_eq!(parsed.expires_in, 7200);
    }

    #[test]
    fn error_body_parses() {
        let parsed: ErrorBody =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"expired"}"#)
                .unwrap();
        assert_eq!(parsed.description(401), "invalid_grant: expired");
    }
}
