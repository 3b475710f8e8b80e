//! Authentication decisions.

use secrecy::{ExposeSecret, SecretString};

use crate::request::Protocol;

/// Number of attempts after which clients are told to stop retrying.
pub const MAX_RETRIES: u32 = 3;

/// Port of the mailbox server for accepted IMAP logins (implicit TLS).
pub const IMAP_PORT: u16 = 993;

/// Port of the relay for accepted SMTP logins (submission).
pub const SMTP_SUBMISSION_PORT: u16 = 587;

/// Reason given for any credential failure.
pub const INVALID_CREDENTIALS: &str = "Invalid login or password";

/// SMTP enhanced status code sent with [`INVALID_CREDENTIALS`].
pub const INVALID_CREDENTIALS_CODE: &str = "535 5.7.8";

/// How long a rejected client should wait, or whether it should give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    /// Retry after this many seconds. The value is the next attempt
    /// number (`attempt + 1`), not a separately computed delay.
    Seconds(u32),
    /// Maximum retries reached. Sent to the proxy as `-1`.
    Exhausted,
}

impl RetryAfter {
    /// Back-off for a failed credential check on the given attempt.
    ///
    /// Grows linearly with the attempt number until [`MAX_RETRIES`].
    #[must_use]
    pub const fn for_attempt(attempt: u32) -> Self {
        if attempt >= MAX_RETRIES {
            Self::Exhausted
        } else {
            Self::Seconds(attempt + 1)
        }
    }

    /// Value as the proxy expects it in `Auth-Wait`.
    #[must_use]
    pub fn as_header_value(self) -> i64 {
        match self {
            Self::Seconds(secs) => i64::from(secs),
            Self::Exhausted => -1,
        }
    }
}

/// Relay credentials the proxy should present upstream.
#[derive(Debug)]
pub struct RelayIdentity {
    /// Relay username.
    pub user: String,
    /// Relay password.
    pub password: SecretString,
}

impl RelayIdentity {
    /// Creates a relay identity.
    #[must_use]
    pub fn new(user: impl Into<String>, password: SecretString) -> Self {
        Self {
            user: user.into(),
            password,
        }
    }
}

impl Clone for RelayIdentity {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
        }
    }
}

/// Where the proxy should forward an accepted session.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Hostname of the upstream server.
    pub host: String,
    /// Upstream port.
    pub port: u16,
    /// Credentials to substitute for the client's, if any.
    pub relay: Option<RelayIdentity>,
}

/// Why a session was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Human-readable reason, sent as `Auth-Status`.
    pub reason: &'static str,
    /// SMTP status code. Only present for SMTP sessions.
    pub error_code: Option<&'static str>,
    /// Retry guidance. `None` means the proxy gets no hint at all.
    pub retry_after: Option<RetryAfter>,
}

/// Outcome of a decision.
#[derive(Debug, Clone)]
pub enum AuthResponse {
    /// Let the client through to the given upstream.
    Accepted(Upstream),
    /// Refuse the client.
    Rejected(Rejection),
}

impl AuthResponse {
    /// The uniform response to any credential failure.
    ///
    /// Whitelist misses, wrong passwords and unreachable mailbox servers all
    /// look the same from the outside.
    #[must_use]
    pub fn invalid_credentials(protocol: Protocol, attempt: u32) -> Self {
        Self::Rejected(Rejection {
            reason: INVALID_CREDENTIALS,
            error_code: match protocol {
                Protocol::Smtp => Some(INVALID_CREDENTIALS_CODE),
                Protocol::Imap => None,
            },
            retry_after: Some(RetryAfter::for_attempt(attempt)),
        })
    }

    /// Returns `true` if the client was let through.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}
