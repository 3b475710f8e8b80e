//! The authentication decision engine.
//!
//! Decides each [`AuthRequest`] in three stages: whitelist, credential
//! cache, then a deadline-bounded call to the [`CredentialValidator`].
//! Every failure collapses to the same "invalid login or password"
//! response; nothing the engine does returns an error to its caller.

mod config;

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

pub use config::{AuthConfig, DEFAULT_VALIDATOR_TIMEOUT};

use crate::cache::{CacheLookup, CredentialCache};
use crate::request::{AuthRequest, Protocol};
use crate::response::{AuthResponse, IMAP_PORT, SMTP_SUBMISSION_PORT, Upstream};
use crate::validator::{CredentialValidator, ValidationOutcome};

/// Decides authentication requests forwarded by the mail proxy.
///
/// Safe to share between tasks; [`decide`](Self::decide) takes `&self`.
pub struct AuthDecisionEngine {
    config: AuthConfig,
    cache: CredentialCache,
    validator: Arc<dyn CredentialValidator>,
}

impl std::fmt::Debug for AuthDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDecisionEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl AuthDecisionEngine {
    /// Creates an engine with an empty cache.
    #[must_use]
    pub fn new(config: AuthConfig, validator: Arc<dyn CredentialValidator>) -> Self {
        let cache = CredentialCache::new(config.cache_ttl).with_cost(config.hash_cost);
        Self {
            config,
            cache,
            validator,
        }
    }

    /// Returns the credential cache.
    #[must_use]
    pub const fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Decides whether the client may proceed and where to.
    ///
    /// Calls the validator at most once, and only for a whitelisted user
    /// without a live cache entry.
    #[instrument(
        level = "debug",
        skip_all,
        fields(user = %request.username, protocol = %request.protocol, attempt = request.attempt)
    )]
    pub async fn decide(&self, request: &AuthRequest) -> AuthResponse {
        if !self.config.is_whitelisted(&request.username) {
            info!("username not whitelisted");
            return AuthResponse::invalid_credentials(request.protocol, request.attempt);
        }

        let confirmed = match self.cache.lookup(&request.username, &request.password).await {
            CacheLookup::Match => {
                debug!("credential confirmed from cache");
                true
            }
            CacheLookup::Mismatch => {
                info!("password differs from cached credential");
                false
            }
            CacheLookup::Miss => self.validate(request).await,
        };

        if confirmed {
            AuthResponse::Accepted(self.upstream(request.protocol))
        } else {
            AuthResponse::invalid_credentials(request.protocol, request.attempt)
        }
    }

    /// Runs the validator under the deadline and caches an acceptance.
    async fn validate(&self, request: &AuthRequest) -> bool {
        let call = self.validator.validate(
            &self.config.imap_host,
            &request.username,
            &request.password,
        );
        let outcome = match timeout(self.config.validator_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => ValidationOutcome::Indeterminate(format!(
                "no answer within {:?}",
                self.config.validator_timeout
            )),
        };

        match outcome {
            ValidationOutcome::Accepted => {
                debug!("credential confirmed by server");
                if let Err(e) = self.cache.store(&request.username, &request.password).await {
                    warn!(error = %e, "failed to cache credential");
                }
                true
            }
            ValidationOutcome::Rejected => {
                info!("credential rejected by server");
                false
            }
            ValidationOutcome::Indeterminate(reason) => {
                warn!(%reason, "could not validate credential");
                false
            }
        }
    }

    fn upstream(&self, protocol: Protocol) -> Upstream {
        match protocol {
            Protocol::Imap => Upstream {
                host: self.config.imap_host.clone(),
                port: IMAP_PORT,
                relay: None,
            },
            Protocol::Smtp => Upstream {
                host: self.config.smtp_host.clone(),
                port: SMTP_SUBMISSION_PORT,
                relay: Some(self.config.relay.clone()),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::response::{RelayIdentity, RetryAfter};

    struct Fixed {
        outcome: ValidationOutcome,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(outcome: ValidationOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialValidator for Fixed {
        async fn validate(&self, host: &str, _: &str, _: &SecretString) -> ValidationOutcome {
            assert_eq!(host, "imap.example.org");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    /// Accepts exactly one password.
    struct Exact {
        password: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialValidator for Exact {
        async fn validate(&self, _: &str, _: &str, password: &SecretString) -> ValidationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if password.expose_secret() == self.password {
                ValidationOutcome::Accepted
            } else {
                ValidationOutcome::Rejected
            }
        }
    }

    struct Stalled;

    #[async_trait]
    impl CredentialValidator for Stalled {
        async fn validate(&self, _: &str, _: &str, _: &SecretString) -> ValidationOutcome {
            std::future::pending().await
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::new(
            ["foo"],
            "imap.example.org",
            "smtp.example.org",
            RelayIdentity::new("qq", "pp".into()),
        )
        .cache_ttl(Duration::from_secs(3))
        .hash_cost(4)
    }

    fn request(protocol: Protocol, user: &str, pass: &str, attempt: u32) -> AuthRequest {
        AuthRequest::new(protocol, user, SecretString::from(pass.to_string()), attempt)
    }

    #[tokio::test]
    async fn test_accept_imap() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let response = engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;
        let AuthResponse::Accepted(upstream) = response else {
            panic!("expected acceptance, got {response:?}");
        };
        assert_eq!(upstream.host, "imap.example.org");
        assert_eq!(upstream.port, 993);
        assert!(upstream.relay.is_none());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_accept_smtp_substitutes_relay_identity() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator);

        let response = engine.decide(&request(Protocol::Smtp, "foo", "bar", 1)).await;
        let AuthResponse::Accepted(upstream) = response else {
            panic!("expected acceptance, got {response:?}");
        };
        assert_eq!(upstream.host, "smtp.example.org");
        assert_eq!(upstream.port, 587);
        let relay = upstream.relay.unwrap();
        assert_eq!(relay.user, "qq");
        assert_eq!(relay.password.expose_secret(), "pp");
    }

    #[tokio::test]
    async fn test_reject_smtp() {
        let validator = Fixed::new(ValidationOutcome::Rejected);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let AuthResponse::Rejected(rejection) =
            engine.decide(&request(Protocol::Smtp, "foo", "bar", 1)).await
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.reason, "Invalid login or password");
        assert_eq!(rejection.error_code, Some("535 5.7.8"));
        assert_eq!(rejection.retry_after, Some(RetryAfter::Seconds(2)));

        let AuthResponse::Rejected(rejection) =
            engine.decide(&request(Protocol::Smtp, "foo", "bar", 3)).await
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.retry_after, Some(RetryAfter::Exhausted));

        // Rejections are never cached.
        assert_eq!(validator.calls(), 2);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_unlisted_user_never_reaches_validator() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let response = engine.decide(&request(Protocol::Imap, "mallory", "bar", 2)).await;
        assert!(!response.is_accepted());
        assert_eq!(validator.calls(), 0);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let first = engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;
        let second = engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;

        assert!(first.is_accepted());
        assert!(second.is_accepted());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_user_with_other_password_is_rejected_locally() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;
        let response = engine.decide(&request(Protocol::Imap, "foo", "guess", 1)).await;

        assert!(!response.is_accepted());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_shared_across_protocols() {
        let validator = Fixed::new(ValidationOutcome::Accepted);
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;
        let response = engine.decide(&request(Protocol::Smtp, "foo", "bar", 1)).await;

        assert!(response.is_accepted());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_indeterminate_is_rejected_and_not_cached() {
        let validator = Fixed::new(ValidationOutcome::Indeterminate("tls".to_string()));
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let AuthResponse::Rejected(rejection) =
            engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.error_code, None);
        assert_eq!(rejection.retry_after, Some(RetryAfter::Seconds(2)));
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_long_password_prefix_does_not_unlock_cache() {
        let prefix = "a".repeat(72);
        let correct = format!("{prefix}correct-suffix");
        let guess = format!("{prefix}attacker-guess");
        let validator = Arc::new(Exact {
            password: correct.clone(),
            calls: AtomicUsize::new(0),
        });
        let engine = AuthDecisionEngine::new(config(), validator.clone());

        let first = engine.decide(&request(Protocol::Imap, "foo", &correct, 1)).await;
        assert!(first.is_accepted());

        let second = engine.decide(&request(Protocol::Imap, "foo", &guess, 1)).await;
        assert!(!second.is_accepted());
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_validator_times_out() {
        let config = config().validator_timeout(Duration::from_secs(5));
        let engine = AuthDecisionEngine::new(config, Arc::new(Stalled));

        let response = engine.decide(&request(Protocol::Smtp, "foo", "bar", 1)).await;
        assert!(!response.is_accepted());
    }
}
