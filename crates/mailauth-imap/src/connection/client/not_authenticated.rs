//! Implementation for the not-authenticated state.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator, is_quotable};
use crate::connection::ImapStream;
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::Status;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and initial capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] if the server refuses the connection,
    /// [`Error::InvalidState`] if it pre-authenticates it (no credential
    /// check would take place), or an I/O or protocol error.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_framed(FramedStream::new(stream)).await
    }

    /// Like [`Client::from_stream`], with an explicit per-operation timeout.
    ///
    /// # Errors
    ///
    /// See [`Client::from_stream`].
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Duration) -> Result<Self> {
        Self::from_framed(FramedStream::with_timeout(stream, io_timeout)).await
    }

    async fn from_framed(mut framed: FramedStream<S>) -> Result<Self> {
        let greeting = framed.read_response().await?;
        let response = ResponseParser::parse(&greeting)?;
        let capabilities = response.capabilities().unwrap_or_default();

        match response {
            Response::Untagged(UntaggedResponse::Status { status, text, .. }) => match status {
                Status::Ok => {}
                Status::Bye => return Err(Error::Bye(text)),
                Status::PreAuth => {
                    return Err(Error::InvalidState(
                        "server pre-authenticated the connection".to_string(),
                    ));
                }
                Status::No | Status::Bad => {
                    return Err(Error::Protocol(format!("unexpected greeting: {text}")));
                }
            },
            _ => return Err(Error::Protocol("missing server greeting".to_string())),
        }

        debug!(capabilities = capabilities.len(), "received greeting");

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            _state: PhantomData,
        })
    }

    /// Authenticates with the server using LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] if the server rejects the credentials. Any
    /// other error means the check could not be completed: LOGIN is
    /// disabled, the credentials cannot be encoded, or the exchange failed.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.login_disabled() {
            return Err(Error::InvalidState(
                "server advertises LOGINDISABLED".to_string(),
            ));
        }
        if !is_quotable(username) || !is_quotable(password) {
            return Err(Error::InvalidArgument(
                "credentials contain CR, LF or NUL".to_string(),
            ));
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.execute(&command).await?;

        Ok(self.transition())
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Upgrades the connection to TLS using STARTTLS.
    ///
    /// Capabilities learned before the upgrade are discarded and fetched
    /// again over the encrypted channel, as RFC 3501 requires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses STARTTLS, the TLS handshake
    /// fails, or the capability refresh fails.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.stream_is_tls() {
            return Err(Error::InvalidState("Stream is already TLS".to_string()));
        }

        self.execute(&Command::StartTls).await?;

        let io_timeout = self.stream.io_timeout();
        let upgraded = self.stream.into_inner().upgrade_to_tls(host).await?;

        let mut client = Self {
            stream: FramedStream::with_timeout(upgraded, io_timeout),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            _state: PhantomData,
        };
        client.capability().await?;
        Ok(client)
    }

    fn stream_is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }
}
