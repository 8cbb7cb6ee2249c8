//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod account_repo;
pub mod listing_repo;
pub mod reduction_log_repo;

pub use account_repo::AccountRepo;
pub use listing_repo::ListingRepo;
pub use reduction_log_repo::ReductionLogRepo;
