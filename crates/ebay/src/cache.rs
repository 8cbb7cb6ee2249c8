//! In-process access-token cache, keyed by user id.
//!
//! Access tokens are ephemeral and never written to durable storage; a
//! cached entry is usable only while its expiry is more than
//! [`EXPIRY_SAFETY_MARGIN_SECS`] away. The cache also hands out per-user
//! refresh locks so concurrent evaluations of one user's listings
//! collapse into a single refresh-token exchange — each exchange may
//! invalidate the previous access token on the marketplace side.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, RwLock};

use repricer_core::types::{DbId, Timestamp};

/// A cached token is not used within this many seconds of its expiry.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// One cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Timestamp,
}

/// Thread-safe per-user token cache; designed to be wrapped in an `Arc`
/// and shared across the whole scheduler pass.
#[derive(Default)]
pub struct TokenCache {
    tokens: RwLock<HashMap<DbId, CachedToken>>,
    refresh_locks: Mutex<HashMap<DbId, Arc<Mutex<()>>>>,
}

impl TokenCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token for a user, if it is still comfortably valid.
    pub async fn get(&self, user_id: DbId, now: Timestamp) -> Option<String> {
        let tokens = self.tokens.read().await;
        let entry = tokens.get(&user_id)?;
        if entry.expires_at - now > Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store a freshly exchanged token.
    pub async fn insert(&self, user_id: DbId, value: String, expires_at: Timestamp) {
        self.tokens
            .write()
            .await
            .insert(user_id, CachedToken { value, expires_at });
    }

    /// Drop a user's token, e.g. on disconnect.
    pub async fn evict(&self, user_id: DbId) {
        self.tokens.write().await.remove(&user_id);
    }

    /// The per-user refresh lock.
    ///
    /// Callers hold the lock across the whole refresh path and re-check
    /// the cache after acquiring it, so a concurrent refresh that
    /// finished first is reused instead of repeated.
    pub async fn refresh_lock(&self, user_id: DbId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn fresh_token_is_returned() {
        let cache = TokenCache::new();
        let now = Utc::now();
        cache
            .insert(1, "tok".into(), now + Duration::hours(2))
            .await;
        assert_eq!(cache.get(1, now).await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn token_inside_safety_margin_is_not_returned() {
        let cache = TokenCache::new();
        let now = Utc::now();
        cache
            .insert(1, "tok".into(), now + Duration::seconds(30))
            .await;
        assert_eq!(cache.get(1, now).await, None);
    }

    #[tokio::test]
    async fn expired_token_is_not_returned() {
        let cache = TokenCache::new();
        let now = Utc::now();
        cache
            .insert(1, "tok".into(), now - Duration::seconds(1))
            .await;
        assert_eq!(cache.get(1, now).await, None);
    }

    #[tokio::test]
    async fn tokens_are_scoped_per_user() {
        let cache = TokenCache::new();
        let now = Utc::now();
        cache
            .insert(1, "user-one".into(), now + Duration::hours(2))
            .await;
        assert_eq!(cache.get(2, now).await, None);
    }

    #[tokio::test]
    async fn evict_removes_the_token() {
        let cache = TokenCache::new();
        let now = Utc::now();
        cache
            .insert(1, "tok".into(), now + Duration::hours(2))
            .await;
        cache.evict(1).await;
        assert_eq!(cache.get(1, now).await, None);
    }

    #[tokio::test]
    async fn refresh_lock_is_shared_per_user() {
        let cache = TokenCache::new();
        let a = cache.refresh_lock(1).await;
        let b = cache.refresh_lock(1).await;
        let other = cache.refresh_lock(2).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn refresh_lock_serializes_refreshes() {
        let cache = Arc::new(TokenCache::new());
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));

        // Two tasks race for the same user; only the first should
        // "refresh", the second must see the cached token after waiting.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let now = Utc::now();
                if cache.get(7, now).await.is_some() {
                    return;
                }
                let lock = cache.refresh_lock(7).await;
                let _guard = lock.lock().await;
                if cache.get(7, Utc::now()).await.is_some() {
                    return; // collapsed into the other task's refresh
                }
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                cache
                    .insert(7, "tok".into(), Utc::now() + Duration::hours(2))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
