//! One scheduler pass over every due listing.
//!
//! Listings come back from the database ordered by owner, so each
//! user's access token, catalog client, and price-update client are
//! built once and reused across their whole group. A user whose token
//! cannot be obtained (even after one recovery attempt) fails fast:
//! their listings are logged as failed and the pass moves on to the
//! next user.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use repricer_core::error::TokenError;
use repricer_core::pricing::{evaluate, Decision, Strategy};
use repricer_core::types::DbId;
use repricer_core::vault::Vault;
use repricer_db::models::listing::Listing;
use repricer_db::models::reduction_log::{NewReductionLog, ReductionOutcome};
use repricer_db::repositories::{ListingRepo, ReductionLogRepo};
use repricer_ebay::browse::{waterfall_search, BrowseClient, SearchTarget};
use repricer_ebay::cache::TokenCache;
use repricer_ebay::config::EbayConfig;
use repricer_ebay::oauth::{OAuthClient, TokenExchanger};
use repricer_ebay::throttle::Throttle;
use repricer_ebay::token::TokenService;
use repricer_ebay::trading::{PriceUpdater, TradingClient, UpdateError};

/// Shared services that outlive any single pass.
pub struct PassContext {
    pub pool: PgPool,
    pub vault: Arc<Vault>,
    pub oauth: Arc<OAuthClient>,
    pub cache: Arc<TokenCache>,
    pub config: Arc<EbayConfig>,
    pub throttle: Arc<Throttle>,
}

/// Counters for one completed pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub evaluated: usize,
    pub applied: usize,
    pub held: usize,
    pub failed: usize,
}

/// Evaluate every due listing and apply the accepted reductions.
pub async fn run_reduction_pass(ctx: &PassContext) -> PassSummary {
    let listings = match ListingRepo::list_due(&ctx.pool).await {
        Ok(listings) => listings,
        Err(err) => {
            tracing::error!(error = %err, "Could not load due listings, skipping pass");
            return PassSummary::default();
        }
    };

    let mut summary = PassSummary::default();
    for (user_id, group) in group_by_user(listings) {
        run_user_group(ctx, user_id, group, &mut summary).await;
    }

    tracing::info!(
        evaluated = summary.evaluated,
        applied = summary.applied,
        held = summary.held,
        failed = summary.failed,
        "Reduction pass complete"
    );
    summary
}

/// Split an already user-ordered listing set into per-user groups.
fn group_by_user(listings: Vec<Listing>) -> Vec<(DbId, Vec<Listing>)> {
    let mut groups: Vec<(DbId, Vec<Listing>)> = Vec::new();
    for listing in listings {
        match groups.last_mut() {
            Some((user_id, group)) if *user_id == listing.user_id => group.push(listing),
            _ => groups.push((listing.user_id, vec![listing])),
        }
    }
    groups
}

async fn run_user_group(
    ctx: &PassContext,
    user_id: DbId,
    group: Vec<Listing>,
    summary: &mut PassSummary,
) {
    let tokens = TokenService::new(
        user_id,
        ctx.pool.clone(),
        Arc::clone(&ctx.vault),
        Arc::clone(&ctx.oauth) as Arc<dyn TokenExchanger>,
        Arc::clone(&ctx.cache),
        Arc::clone(&ctx.config),
    );

    let access_token = match obtain_token(&tokens).await {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!(
                user_id,
                error = %err,
                code = err.code(),
                "Token unavailable, failing this user's listings for the pass"
            );
            for listing in &group {
                summary.evaluated += 1;
                summary.failed += 1;
                record(
                    ctx,
                    listing,
                    None,
                    None,
                    ReductionOutcome::Failed,
                    Some(err.code().to_string()),
                )
                .await;
            }
            return;
        }
    };

    // The owner's marketplace user name, for same-seller filtering.
    let seller_id = match tokens.get_credentials().await {
        Ok(creds) => creds.ebay_user_id.unwrap_or_default(),
        Err(_) => String::new(),
    };

    let clients = build_clients(ctx, &access_token);
    let (browse, trading) = match clients {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(user_id, error = %err, "Could not build marketplace clients");
            for listing in &group {
                summary.evaluated += 1;
                summary.failed += 1;
                record(
                    ctx,
                    listing,
                    None,
                    None,
                    ReductionOutcome::Failed,
                    Some("CLIENT_BUILD_FAILED".into()),
                )
                .await;
            }
            return;
        }
    };

    for listing in group {
        summary.evaluated += 1;
        run_listing(ctx, &browse, &trading, &seller_id, &listing, summary).await;
    }
}

/// Get an access token, allowing the service one bounded recovery
/// attempt before giving up on the user for this pass.
async fn obtain_token(tokens: &TokenService) -> Result<String, TokenError> {
    match tokens.get_access_token().await {
        Ok(token) => Ok(token),
        Err(err) => {
            if tokens.attempt_recovery(&err).await {
                tokens.get_access_token().await
            } else {
                Err(err)
            }
        }
    }
}

fn build_clients(
    ctx: &PassContext,
    access_token: &str,
) -> Result<(BrowseClient, TradingClient), reqwest::Error> {
    let browse = BrowseClient::new(
        ctx.config.api_base_url.clone(),
        access_token.to_string(),
        ctx.config.http_timeout,
    )?;
    let trading = TradingClient::new(
        ctx.config.api_base_url.clone(),
        access_token.to_string(),
        ctx.config.http_timeout,
    )?;
    Ok((browse, trading))
}

async fn run_listing(
    ctx: &PassContext,
    browse: &BrowseClient,
    trading: &TradingClient,
    seller_id: &str,
    listing: &Listing,
    summary: &mut PassSummary,
) {
    let Some(snapshot) = listing.snapshot() else {
        tracing::warn!(
            listing_id = listing.id,
            strategy = %listing.strategy,
            "Unknown strategy, listing cannot be evaluated"
        );
        summary.failed += 1;
        record(
            ctx,
            listing,
            None,
            None,
            ReductionOutcome::Failed,
            Some("UNKNOWN_STRATEGY".into()),
        )
        .await;
        return;
    };

    // Market data only matters for market-based pricing, and a failed
    // search degrades to "no data" inside the waterfall.
    let market = if snapshot.strategy == Strategy::MarketBased {
        ctx.throttle.acquire().await;
        let target = SearchTarget {
            gtin: listing.gtin.clone(),
            title: listing.title.clone(),
            category_id: listing.category_id.clone(),
            seller_id: seller_id.to_string(),
        };
        Some(waterfall_search(browse, &target).await)
    } else {
        None
    };

    let now = Utc::now();
    match evaluate(&snapshot, market.as_ref(), now) {
        Decision::Hold => {
            summary.held += 1;
            record(ctx, listing, None, None, ReductionOutcome::Skipped, None).await;
        }
        Decision::Reduce { new_price, reason } => {
            ctx.throttle.acquire().await;
            match trading
                .update_price(&listing.item_id, new_price, &listing.currency)
                .await
            {
                Ok(()) => {
                    let next = now + Duration::days(i64::from(listing.interval_days));
                    match ListingRepo::apply_reduction(&ctx.pool, listing.id, new_price, now, next)
                        .await
                    {
                        Ok(_) => {
                            summary.applied += 1;
                            tracing::info!(
                                listing_id = listing.id,
                                old_price = %listing.current_price,
                                new_price = %new_price,
                                reason = reason.as_str(),
                                "Reduction applied"
                            );
                            record(
                                ctx,
                                listing,
                                Some(new_price),
                                Some(reason.as_str().to_string()),
                                ReductionOutcome::Applied,
                                None,
                            )
                            .await;
                        }
                        Err(err) => {
                            // The marketplace accepted the new price but we
                            // could not persist it; the next pass re-reads the
                            // stale row and converges.
                            summary.failed += 1;
                            tracing::error!(
                                listing_id = listing.id,
                                error = %err,
                                "Price updated on marketplace but not persisted"
                            );
                            record(
                                ctx,
                                listing,
                                Some(new_price),
                                Some(reason.as_str().to_string()),
                                ReductionOutcome::Failed,
                                Some("STORAGE_ERROR".into()),
                            )
                            .await;
                        }
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        listing_id = listing.id,
                        error = %err,
                        "Marketplace rejected the price update"
                    );
                    record(
                        ctx,
                        listing,
                        Some(new_price),
                        Some(reason.as_str().to_string()),
                        ReductionOutcome::Failed,
                        Some(update_error_code(&err).into()),
                    )
                    .await;
                }
            }
        }
    }
}

fn update_error_code(err: &UpdateError) -> &'static str {
    match err {
        UpdateError::Rejected { .. } => "PRICE_UPDATE_REJECTED",
        UpdateError::Network(_) => "NETWORK_ERROR",
    }
}

async fn record(
    ctx: &PassContext,
    listing: &Listing,
    new_price: Option<rust_decimal::Decimal>,
    reason: Option<String>,
    outcome: ReductionOutcome,
    error_code: Option<String>,
) {
    let entry = NewReductionLog {
        listing_id: listing.id,
        user_id: listing.user_id,
        old_price: listing.current_price,
        new_price,
        reason,
        outcome,
        error_code,
    };
    if let Err(err) = ReductionLogRepo::record(&ctx.pool, &entry).await {
        tracing::error!(
            listing_id = listing.id,
            error = %err,
            "Could not record reduction outcome"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn listing(id: DbId, user_id: DbId) -> Listing {
        Listing {
            id,
            user_id,
            item_id: format!("11001234{id}"),
            title: "Vintage Camera".into(),
            gtin: None,
            category_id: None,
            current_price: dec!(100),
            original_price: dec!(120),
            minimum_price: dec!(80),
            currency: "USD".into(),
            reduction_enabled: true,
            strategy: "fixed_percentage".into(),
            reduction_amount: dec!(5),
            interval_days: 7,
            trigger_days: None,
            watch_threshold: None,
            end_time: Utc::now(),
            watch_count: 3,
            last_reduction_at: None,
            next_reduction_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn grouping_preserves_order_within_each_user() {
        let rows = vec![listing(1, 7), listing(2, 7), listing(3, 9), listing(4, 9)];
        let groups = group_by_user(rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 7);
        assert_eq!(groups[0].1.iter().map(|l| l.id).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(groups[1].0, 9);
        assert_eq!(groups[1].1.iter().map(|l| l.id).collect::<Vec<_>>(), [3, 4]);
    }

    #[test]
    fn grouping_empty_input_yields_no_groups() {
        assert!(group_by_user(Vec::new()).is_empty());
    }

    #[test]
    fn update_error_codes_are_stable() {
        let rejected = UpdateError::Rejected {
            status: 400,
            message: "nope".into(),
        };
        assert_eq!(update_error_code(&rejected), "PRICE_UPDATE_REJECTED");
        assert_eq!(
            update_error_code(&UpdateError::Network("timeout".into())),
            "NETWORK_ERROR"
        );
    }
}
