use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repricer_core::vault::Vault;
use repricer_ebay::cache::TokenCache;
use repricer_ebay::oauth::OAuthClient;
use repricer_ebay::throttle::Throttle;

use crate::config::WorkerConfig;
use crate::pass::{run_reduction_pass, PassContext};

mod config;
mod pass;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repricer_worker=debug,repricer_ebay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        pass_interval_secs = config.pass_interval.as_secs(),
        token_url = %config.ebay.oauth_token_url,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = repricer_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    repricer_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    repricer_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Shared services ---
    let ebay_config = Arc::new(config.ebay.clone());
    let ctx = PassContext {
        pool,
        vault: Arc::new(Vault::new(&config.encryption_secret)),
        oauth: Arc::new(
            OAuthClient::new(ebay_config.oauth_token_url.clone(), ebay_config.http_timeout)
                .expect("Failed to build OAuth client"),
        ),
        cache: Arc::new(TokenCache::new()),
        throttle: Arc::new(Throttle::new(ebay_config.call_spacing)),
        config: ebay_config,
    };

    // --- Scheduler loop ---
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let scheduler = tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.pass_interval);
        loop {
            tokio::select! {
                _ = loop_cancel.cancelled() => {
                    tracing::info!("Scheduler loop stopping");
                    break;
                }
                _ = interval.tick() => {
                    tracing::info!("Starting reduction pass");
                    run_reduction_pass(&ctx).await;
                }
            }
        }
    });

    shutdown_signal().await;
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(30), scheduler).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
