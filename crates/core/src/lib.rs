//! Domain logic for the repricer: the credential vault, the token error
//! taxonomy, competitor-sample statistics, and the price reduction
//! decision engine.
//!
//! This crate has zero internal deps so it can be used by the db layer,
//! the eBay client crate, and the worker alike. Everything here is pure:
//! no I/O, no clocks (callers pass `now`), no global state beyond the
//! process-wide vault key the caller constructs.

pub mod error;
pub mod market;
pub mod pricing;
pub mod types;
pub mod vault;
