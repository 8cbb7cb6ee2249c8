//! Price updates against the marketplace.
//!
//! A single concern: tell eBay the new price for one listing. The
//! [`PriceUpdater`] trait keeps the scheduler testable without a live
//! marketplace; [`TradingClient`] is the reqwest implementation with
//! the shared retry policy.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::retry::{is_retryable_status, next_delay, RetryConfig};

/// A failed price update.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("price update rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("network error during price update: {0}")]
    Network(String),
}

impl UpdateError {
    /// Whether the failure was marketplace load rather than a defect in
    /// the request, i.e. worth retrying on a later pass.
    pub fn is_transient(&self) -> bool {
        match self {
            UpdateError::Network(_) => true,
            UpdateError::Rejected { status, .. } => is_retryable_status(*status),
        }
    }
}

/// Push one new price to the marketplace.
#[async_trait]
pub trait PriceUpdater {
    async fn update_price(
        &self,
        item_id: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), UpdateError>;
}

#[derive(Debug, Serialize)]
struct PriceBody<'a> {
    price: PriceValue,
    #[serde(rename = "currencyId")]
    currency_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PriceValue {
    value: String,
}

/// reqwest-backed [`PriceUpdater`] holding the user's access token.
pub struct TradingClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    retry: RetryConfig,
}

impl TradingClient {
    pub fn new(
        base_url: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            access_token,
            retry: RetryConfig::default(),
        })
    }

    async fn send_update(
        &self,
        item_id: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), UpdateError> {
        let url = format!("{}/sell/inventory/v1/listing/{item_id}/price", self.base_url);
        let body = PriceBody {
            price: PriceValue {
                value: price.to_string(),
            },
            currency_id: currency,
        };

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpdateError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(UpdateError::Rejected { status, message })
    }
}

#[async_trait]
impl PriceUpdater for TradingClient {
    async fn update_price(
        &self,
        item_id: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), UpdateError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.send_update(item_id, price, currency).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.retry.max_attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        item_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Price update failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn network_errors_are_transient() {
        assert!(UpdateError::Network("timeout".into()).is_transient());
    }

    #[test]
    fn rate_limit_is_transient_but_validation_is_not() {
        let rate_limited = UpdateError::Rejected {
            status: 429,
            message: "slow down".into(),
        };
        let invalid = UpdateError::Rejected {
            status: 400,
            message: "price below allowed minimum".into(),
        };
        assert!(rate_limited.is_transient());
        assert!(!invalid.is_transient());
    }

    #[test]
    fn price_body_serializes_with_two_decimals() {
        let body = PriceBody {
            price: PriceValue {
                value: dec!(19.39).to_string(),
            },
            currency_id: "USD",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"price":{"value":"19.39"},"currencyId":"USD"}"#);
    }
}
