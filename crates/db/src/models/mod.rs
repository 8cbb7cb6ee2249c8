//! Domain model structs.
//!
//! Each submodule contains a `FromRow` entity struct matching the
//! database row, plus any insert DTOs the repositories need.

pub mod account;
pub mod listing;
pub mod reduction_log;
