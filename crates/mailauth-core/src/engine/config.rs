//! Engine configuration.

use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{DEFAULT_COST, DEFAULT_TTL};
use crate::response::RelayIdentity;

/// Default deadline for a single validator call.
pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable settings for an [`AuthDecisionEngine`](super::AuthDecisionEngine).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Usernames allowed to authenticate. Exact, case-sensitive match.
    pub whitelist: HashSet<String>,
    /// Mailbox server: validation target and IMAP upstream.
    pub imap_host: String,
    /// Submission relay used as the SMTP upstream.
    pub smtp_host: String,
    /// Identity presented to the relay for every SMTP session.
    pub relay: RelayIdentity,
    /// How long a confirmed credential stays cached.
    pub cache_ttl: Duration,
    /// bcrypt cost for cached hashes.
    pub hash_cost: u32,
    /// Deadline for one validator call.
    pub validator_timeout: Duration,
}

impl AuthConfig {
    /// Creates a configuration with default TTL, cost and timeout.
    #[must_use]
    pub fn new<I, S>(
        whitelist: I,
        imap_host: impl Into<String>,
        smtp_host: impl Into<String>,
        relay: RelayIdentity,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            imap_host: imap_host.into(),
            smtp_host: smtp_host.into(),
            relay,
            cache_ttl: DEFAULT_TTL,
            hash_cost: DEFAULT_COST,
            validator_timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }

    /// Sets the cache TTL.
    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the bcrypt cost.
    #[must_use]
    pub const fn hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Sets the validator deadline.
    #[must_use]
    pub const fn validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout = timeout;
        self
    }

    /// Returns `true` if `username` may authenticate at all.
    #[must_use]
    pub fn is_whitelisted(&self, username: &str) -> bool {
        self.whitelist.contains(username)
    }
}
