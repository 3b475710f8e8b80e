//! Credential validation against an authoritative server.

use async_trait::async_trait;
use secrecy::SecretString;

/// Result of asking the authoritative server about a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The server accepted the credential.
    Accepted,
    /// The server refused the credential.
    Rejected,
    /// No decision could be obtained (network, TLS or protocol failure).
    Indeterminate(String),
}

/// Checks a username/password pair against a server.
///
/// Implementations must release any connection before returning, on every
/// path, and should report failures as [`ValidationOutcome::Indeterminate`]
/// rather than panicking.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Validates `username`/`password` against `host`.
    async fn validate(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
    ) -> ValidationOutcome;
}
