//! eBay API client: OAuth token exchange and caching, the tiered
//! competitive-price search, and the price-update call.
//!
//! [`token::TokenService`] owns the credential lifecycle for one user;
//! [`browse`] runs the catalog-search waterfall behind the
//! [`browse::CatalogSource`] seam; [`trading`] issues price updates.
//! All marketplace-facing calls share the [`retry`] backoff policy and
//! are spaced out by the caller through [`throttle::Throttle`].

pub mod browse;
pub mod cache;
pub mod config;
pub mod oauth;
pub mod retry;
pub mod throttle;
pub mod token;
pub mod trading;
