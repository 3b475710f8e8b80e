//! Type-state IMAP client connection.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile time.
//! Only two states matter for a credential check:
//!
//! - `NotAuthenticated`: Initial state after connection
//! - `Authenticated`: After a successful LOGIN
//!
//! Each state only exposes methods that are valid for that state.

mod authenticated;
mod not_authenticated;
mod states;

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

pub use self::states::{Authenticated, NotAuthenticated};
use super::framed::{FramedStream, ResponseAccumulator};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
///
/// The type parameter `State` tracks the connection state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    _state: PhantomData<State>,
}

// Manual Debug implementation since FramedStream doesn't implement Debug
impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Moves the connection into another state.
    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }

    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if LOGIN is disabled (e.g., before STARTTLS).
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.has_capability(&Capability::LoginDisabled)
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server refuses it.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Sends a command and waits for its tagged completion.
    ///
    /// Capabilities announced along the way replace the stored set. A
    /// completion other than `OK` is mapped to the matching [`Error`].
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<()> {
        let tag = self.tag_gen.next();
        trace!(tag = %tag, command = command.name(), "sending");

        let mut segments = command.serialize(&tag);
        let sent = self.send_segments(&tag, &segments).await;
        for segment in &mut segments {
            segment.fill(0);
        }
        sent?;

        let responses = ResponseAccumulator::new(tag.as_str())
            .read_until_tagged(&mut self.stream)
            .await?;

        for response_bytes in &responses {
            if let Some(caps) = ResponseParser::parse(response_bytes)
                .ok()
                .and_then(|response| response.capabilities())
            {
                self.capabilities = caps;
            }
        }

        Self::check_tagged_ok(&responses, &tag)
    }

    /// Sends a serialized command, waiting for a continuation request
    /// before each literal.
    async fn send_segments(&mut self, tag: &str, segments: &[Vec<u8>]) -> Result<()> {
        let Some((first, literals)) = segments.split_first() else {
            return Ok(());
        };
        self.stream.write_command(first).await?;

        for segment in literals {
            self.await_continuation(tag).await?;
            self.stream.write_command(segment).await?;
        }
        Ok(())
    }

    /// Reads until the server asks for the next literal.
    ///
    /// A tagged completion instead means the server refused the command
    /// before seeing all of it.
    async fn await_continuation(&mut self, tag: &str) -> Result<()> {
        loop {
            let response = self.stream.read_response().await?;
            let parsed = ResponseParser::parse(&response)?;
            match parsed {
                Response::Continuation(_) => return Ok(()),
                Response::Tagged { tag: resp_tag, .. } if resp_tag == tag => {
                    Self::check_tagged_ok(&[response], tag)?;
                    return Err(Error::Protocol(
                        "command completed before its literal was sent".to_string(),
                    ));
                }
                _ => trace!("untagged response while waiting for continuation"),
            }
        }
    }

    /// Checks that the tagged response is OK.
    pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
        for response_bytes in responses.iter().rev() {
            if let Ok(Response::Tagged {
                tag: resp_tag,
                status,
                code: _,
                text,
            }) = ResponseParser::parse(response_bytes)
                && resp_tag == tag
            {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(()),
                    Status::No => Err(Error::No(text)),
                    Status::Bad => Err(Error::Bad(text)),
                    Status::Bye => Err(Error::Bye(text)),
                };
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }
}
