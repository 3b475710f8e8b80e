//! IMAP-backed credential validation.
//!
//! A credential is valid if the mailbox server accepts it in a `LOGIN`.
//! Each validation opens its own connection and always closes it.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use mailauth_imap::{Client, Config, Security, connection::connect};

use crate::validator::{CredentialValidator, ValidationOutcome};

/// Validates credentials by logging in to an IMAP server.
#[derive(Debug, Clone)]
pub struct ImapValidator {
    port: u16,
    security: Security,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ImapValidator {
    /// Creates a validator using the given security mode on its default port.
    #[must_use]
    pub const fn new(security: Security) -> Self {
        Self {
            port: security.default_port(),
            security,
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(20),
        }
    }

    /// Overrides the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect and per-operation I/O timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    /// Returns the configured port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    async fn login(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> mailauth_imap::Result<()> {
        let config = Config::builder(host)
            .port(self.port)
            .security(self.security)
            .connect_timeout(self.connect_timeout)
            .io_timeout(self.io_timeout)
            .build();

        let stream = connect(&config).await?;
        let mut client = Client::from_stream_with_timeout(stream, config.io_timeout).await?;
        if config.security == Security::StartTls {
            client = client.starttls(host).await?;
        }

        let session = client.login(username, password).await?;
        if let Err(e) = session.logout().await {
            debug!(error = %e, "logout after successful login failed");
        }
        Ok(())
    }
}

impl Default for ImapValidator {
    fn default() -> Self {
        Self::new(Security::Implicit)
    }
}

#[async_trait]
impl CredentialValidator for ImapValidator {
    async fn validate(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
    ) -> ValidationOutcome {
        let result = self.login(host, username, password.expose_secret()).await;
        outcome_from(result)
    }
}

/// Maps the result of an IMAP login attempt to a validation outcome.
///
/// Only a tagged `NO` is a rejection. Everything else that is not success
/// means the server never gave a verdict.
#[must_use]
pub fn outcome_from(result: mailauth_imap::Result<()>) -> ValidationOutcome {
    match result {
        Ok(()) => ValidationOutcome::Accepted,
        Err(e) if e.is_refusal() => ValidationOutcome::Rejected,
        Err(e) => ValidationOutcome::Indeterminate(e.to_string()),
    }
}
