//! Expiring cache of confirmed credentials.
//!
//! Only bcrypt hashes are kept. Entries expire lazily: reading an expired
//! entry removes it and reports a miss. There is no background sweep.
//!
//! bcrypt only looks at the first 72 bytes of its input, a trailing NUL
//! included. Passwords of 72 bytes or more are never cached, so two of
//! them sharing a prefix cannot verify against each other.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::task;
use tokio::time::Instant;
use bcrypt::BcryptError;
use tracing::{debug, trace, warn};

use crate::Result;

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default bcrypt cost.
pub const DEFAULT_COST: u32 = 10;

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// No live entry for this user.
    Miss,
    /// Live entry whose hash verifies the password.
    Match,
    /// Live entry whose hash does not verify the password.
    Mismatch,
}

#[derive(Debug)]
struct CacheEntry {
    hash: String,
    expires_at: Instant,
}

/// Thread-safe cache of recently confirmed (username, password) pairs.
///
/// The internal lock only guards map access. Hashing and verification run on
/// the blocking pool with the lock released.
#[derive(Debug)]
pub struct CredentialCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    cost: u32,
}

impl CredentialCache {
    /// Creates an empty cache with the given TTL and the default bcrypt cost.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            cost: DEFAULT_COST,
        }
    }

    /// Sets the bcrypt cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Returns the entry time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries, expired ones included until they are read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Checks a password against the cached hash for `username`.
    ///
    /// An expired entry is deleted and reported as [`CacheLookup::Miss`].
    /// A password too long for bcrypt can never equal a cached one and is
    /// reported as [`CacheLookup::Mismatch`]. A hash that cannot be verified
    /// is treated as a miss so the caller falls back to a fresh validation.
    pub async fn lookup(&self, username: &str, password: &SecretString) -> CacheLookup {
        let hash = {
            let mut entries = self.lock();
            match entries.get(username) {
                None => return CacheLookup::Miss,
                Some(entry) if entry.expires_at <= Instant::now() => {
                    entries.remove(username);
                    trace!(user = username, "cache entry expired");
                    return CacheLookup::Miss;
                }
                Some(entry) => entry.hash.clone(),
            }
        };

        let candidate = password.expose_secret().to_owned();
        let verified =
            task::spawn_blocking(move || bcrypt::non_truncating_verify(candidate, &hash)).await;

        match verified {
            Ok(Ok(true)) => CacheLookup::Match,
            Ok(Ok(false) | Err(BcryptError::Truncation(_))) => CacheLookup::Mismatch,
            Ok(Err(e)) => {
                warn!(user = username, error = %e, "unverifiable cache entry");
                CacheLookup::Miss
            }
            Err(e) => {
                warn!(user = username, error = %e, "hash verification task failed");
                CacheLookup::Miss
            }
        }
    }

    /// Hashes `password` and stores it for `username`, replacing any
    /// previous entry. The entry expires after the cache TTL.
    ///
    /// A password of 72 bytes or more is not cached. Any previous entry
    /// for `username` is dropped instead, so the next login is validated
    /// afresh.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the hashing task is lost.
    pub async fn store(&self, username: &str, password: &SecretString) -> Result<()> {
        let plain = password.expose_secret().to_owned();
        let cost = self.cost;
        let hash = match task::spawn_blocking(move || bcrypt::non_truncating_hash(plain, cost))
            .await?
        {
            Ok(hash) => hash,
            Err(BcryptError::Truncation(len)) => {
                self.lock().remove(username);
                debug!(user = username, len, "password too long to cache");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let entry = CacheEntry {
            hash,
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(username.to_string(), entry);
        trace!(user = username, "cached credential");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts.
    const TEST_COST: u32 = 4;

    fn cache(ttl: Duration) -> CredentialCache {
        CredentialCache::new(ttl).with_cost(TEST_COST)
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_lookup_empty_is_miss() {
        let cache = cache(Duration::from_secs(60));
        assert_eq!(cache.lookup("foo", &secret("bar")).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_store_then_match() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("bar")).await.unwrap();

        assert_eq!(cache.lookup("foo", &secret("bar")).await, CacheLookup::Match);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_store_then_mismatch() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("bar")).await.unwrap();

        assert_eq!(
            cache.lookup("foo", &secret("baz")).await,
            CacheLookup::Mismatch
        );
        // A mismatch does not evict.
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_exact() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("bar")).await.unwrap();

        assert_eq!(cache.lookup("Foo", &secret("bar")).await, CacheLookup::Miss);
        assert_eq!(cache.lookup("foo ", &secret("bar")).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_never_stores_plaintext() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("bar")).await.unwrap();

        let entries = cache.lock();
        let entry = entries.get("foo").unwrap();
        assert_ne!(entry.hash, "bar");
        assert!(entry.hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("old")).await.unwrap();
        cache.store("foo", &secret("new")).await.unwrap();

        assert_eq!(cache.lookup("foo", &secret("new")).await, CacheLookup::Match);
        assert_eq!(
            cache.lookup("foo", &secret("old")).await,
            CacheLookup::Mismatch
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged() {
        let cache = cache(Duration::from_millis(200));
        cache.store("foo", &secret("bar")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("foo", &secret("bar")).await, CacheLookup::Miss);
        assert!(cache.is_empty());
    }

    fn long_password(suffix: &str) -> SecretString {
        secret(&format!("{}{suffix}", "a".repeat(72)))
    }

    #[tokio::test]
    async fn test_long_password_is_not_cached() {
        let cache = cache(Duration::from_secs(60));
        cache
            .store("foo", &long_password("correct-suffix"))
            .await
            .unwrap();

        assert!(cache.is_empty());
        assert_eq!(
            cache.lookup("foo", &long_password("attacker-guess")).await,
            CacheLookup::Miss
        );
    }

    #[tokio::test]
    async fn test_long_password_replaces_previous_entry() {
        let cache = cache(Duration::from_secs(60));
        cache.store("foo", &secret("bar")).await.unwrap();
        cache
            .store("foo", &long_password("correct-suffix"))
            .await
            .unwrap();

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_long_candidate_is_mismatch() {
        let cache = cache(Duration::from_secs(60));
        let prefix = "a".repeat(71);
        cache.store("foo", &secret(&prefix)).await.unwrap();
        assert_eq!(cache.len(), 1);

        assert_eq!(
            cache.lookup("foo", &long_password("attacker-guess")).await,
            CacheLookup::Mismatch
        );
        assert_eq!(cache.lookup("foo", &secret(&prefix)).await, CacheLookup::Match);
    }

    #[test]
    fn test_defaults() {
        let cache = CredentialCache::default();
        assert_eq!(cache.ttl(), Duration::from_secs(900));
        assert_eq!(cache.cost, 10);
        assert!(cache.is_empty());
    }
}
