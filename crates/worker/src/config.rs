//! Worker configuration loaded from environment variables.

use std::time::Duration;

use repricer_ebay::config::EbayConfig;

/// Everything the scheduler process needs at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Secret the credential vault derives its AES key from.
    pub encryption_secret: String,
    /// Time between scheduler passes.
    pub pass_interval: Duration,
    /// Marketplace endpoints and tuning.
    pub ebay: EbayConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                       | Default  |
    /// |-------------------------------|----------|
    /// | `DATABASE_URL`                | required |
    /// | `CREDENTIAL_ENCRYPTION_KEY`   | required |
    /// | `REDUCTION_PASS_INTERVAL_SECS`| `3600`   |
    ///
    /// Marketplace variables are documented on [`EbayConfig::from_env`].
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let encryption_secret = std::env::var("CREDENTIAL_ENCRYPTION_KEY")
            .expect("CREDENTIAL_ENCRYPTION_KEY must be set");

        let pass_interval_secs: u64 = std::env::var("REDUCTION_PASS_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("REDUCTION_PASS_INTERVAL_SECS must be a valid u64");

        Self {
            database_url,
            encryption_secret,
            pass_interval: Duration::from_secs(pass_interval_secs),
            ebay: EbayConfig::from_env(),
        }
    }
}
