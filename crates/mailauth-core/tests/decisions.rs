//! End-to-end decision tests.
//!
//! The engine is wired to the real IMAP validator, pointed at a tiny
//! plaintext IMAP server running on a local port.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mailauth_core::service::{ImapValidator, Security};
use mailauth_core::{
    AuthConfig, AuthDecisionEngine, AuthRequest, AuthResponse, CredentialValidator, Protocol,
    RelayIdentity, RetryAfter, ValidationOutcome,
};

/// Serves LOGIN on 127.0.0.1, accepting only `foo`/`bar`.
/// Returns the port and a counter of LOGIN commands seen.
async fn spawn_imap_server() -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let logins = Arc::new(AtomicUsize::new(0));
    let counter = logins.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                write
                    .write_all(b"* OK [CAPABILITY IMAP4rev1] test server ready\r\n")
                    .await
                    .unwrap();

                while let Ok(Some(line)) = lines.next_line().await {
                    let mut parts = line.splitn(3, ' ');
                    let tag = parts.next().unwrap_or_default().to_string();
                    let command = parts.next().unwrap_or_default().to_ascii_uppercase();
                    let args = parts.next().unwrap_or_default();

                    let reply = match command.as_str() {
                        "LOGIN" => {
                            counter.fetch_add(1, Ordering::SeqCst);
                            if args == "foo bar" {
                                format!("{tag} OK Logged in\r\n")
                            } else {
                                format!("{tag} NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
                            }
                        }
                        "LOGOUT" => format!("* BYE Logging out\r\n{tag} OK Logout completed\r\n"),
                        _ => format!("{tag} BAD Unknown command\r\n"),
                    };
                    if write.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                    if command == "LOGOUT" {
                        return;
                    }
                }
            });
        }
    });

    (port, logins)
}

fn config() -> AuthConfig {
    AuthConfig::new(
        ["foo"],
        "127.0.0.1",
        "smtp.example.org",
        RelayIdentity::new("qq", SecretString::from("pp".to_string())),
    )
    .hash_cost(4)
    .cache_ttl(Duration::from_secs(60))
    .validator_timeout(Duration::from_secs(5))
}

fn request(protocol: Protocol, user: &str, pass: &str, attempt: u32) -> AuthRequest {
    AuthRequest::new(protocol, user, SecretString::from(pass.to_string()), attempt)
}

fn engine_for(port: u16) -> AuthDecisionEngine {
    let validator = ImapValidator::new(Security::None).with_port(port);
    AuthDecisionEngine::new(config(), Arc::new(validator))
}

#[tokio::test]
async fn test_valid_login_is_accepted_and_cached() {
    let (port, logins) = spawn_imap_server().await;
    let engine = engine_for(port);

    let response = engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await;
    let AuthResponse::Accepted(upstream) = response else {
        panic!("expected acceptance, got {response:?}");
    };
    assert_eq!(upstream.host, "127.0.0.1");
    assert_eq!(upstream.port, 993);
    assert_eq!(logins.load(Ordering::SeqCst), 1);

    // Served from cache.
    let response = engine.decide(&request(Protocol::Smtp, "foo", "bar", 1)).await;
    assert!(response.is_accepted());
    assert_eq!(logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrong_password_is_rejected_by_server() {
    let (port, logins) = spawn_imap_server().await;
    let engine = engine_for(port);

    let response = engine.decide(&request(Protocol::Smtp, "foo", "nope", 2)).await;
    let AuthResponse::Rejected(rejection) = response else {
        panic!("expected rejection, got {response:?}");
    };
    assert_eq!(rejection.error_code, Some("535 5.7.8"));
    assert_eq!(rejection.retry_after, Some(RetryAfter::Seconds(3)));
    assert_eq!(logins.load(Ordering::SeqCst), 1);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_cached_user_cannot_probe_other_passwords() {
    let (port, logins) = spawn_imap_server().await;
    let engine = engine_for(port);

    assert!(engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await.is_accepted());
    for guess in ["baz", "qux", "hunter2"] {
        let response = engine.decide(&request(Protocol::Imap, "foo", guess, 1)).await;
        assert!(!response.is_accepted());
    }
    assert_eq!(logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_entry_revalidates() {
    let (port, logins) = spawn_imap_server().await;
    let validator = ImapValidator::new(Security::None).with_port(port);
    let engine = AuthDecisionEngine::new(
        config().cache_ttl(Duration::from_millis(300)),
        Arc::new(validator),
    );

    assert!(engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await.is_accepted());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(engine.decide(&request(Protocol::Imap, "foo", "bar", 1)).await.is_accepted());

    assert_eq!(logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_decisions() {
    let (port, _) = spawn_imap_server().await;
    let engine = Arc::new(engine_for(port));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let pass = if i % 2 == 0 { "bar" } else { "wrong" };
            engine.decide(&request(Protocol::Imap, "foo", pass, 1)).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_accepted() {
            accepted += 1;
        }
    }
    // Every correct password wins. Wrong ones may be refused by the server
    // or by the cache, depending on ordering.
    assert_eq!(accepted, 4);
}

struct Counting(AtomicUsize);

#[async_trait]
impl CredentialValidator for Counting {
    async fn validate(&self, _: &str, _: &str, _: &SecretString) -> ValidationOutcome {
        self.0.fetch_add(1, Ordering::SeqCst);
        ValidationOutcome::Accepted
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unlisted_users_are_rejected_without_validation(
        user in "\\PC{0,24}".prop_filter("whitelisted", |u| u != "foo"),
        attempt in 0u32..10,
        smtp in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let validator = Arc::new(Counting(AtomicUsize::new(0)));
        let engine = AuthDecisionEngine::new(config(), validator.clone());
        let protocol = if smtp { Protocol::Smtp } else { Protocol::Imap };

        let response = runtime.block_on(engine.decide(&request(protocol, &user, "bar", attempt)));

        let AuthResponse::Rejected(rejection) = response else {
            panic!("unlisted user {user:?} was accepted");
        };
        let expected = if attempt >= 3 {
            RetryAfter::Exhausted
        } else {
            RetryAfter::Seconds(attempt + 1)
        };
        prop_assert_eq!(rejection.retry_after, Some(expected));
        prop_assert_eq!(rejection.error_code.is_some(), smtp);
        prop_assert_eq!(validator.0.load(Ordering::SeqCst), 0);
        prop_assert!(engine.cache().is_empty());
    }
}
