//! Authentication requests.

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

/// Mail protocol the client is authenticating for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Mailbox access.
    Imap,
    /// Message submission.
    Smtp,
}

impl Protocol {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a protocol name is neither `imap` nor `smtp`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported protocol: {0:?}")]
pub struct ParseProtocolError(pub String);

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    /// Parses the exact lowercase names the mail proxy sends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imap" => Ok(Self::Imap),
            "smtp" => Ok(Self::Smtp),
            other => Err(ParseProtocolError(other.to_string())),
        }
    }
}

/// One authentication attempt forwarded by the mail proxy.
///
/// The password is held as a [`SecretString`], so `Debug` output never
/// contains it.
#[derive(Debug)]
pub struct AuthRequest {
    /// Protocol the client is using.
    pub protocol: Protocol,
    /// Username as supplied by the client. Not normalized.
    pub username: String,
    /// Password as supplied by the client.
    pub password: SecretString,
    /// Attempt number within the client's session, starting at 1.
    pub attempt: u32,
}

impl AuthRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        protocol: Protocol,
        username: impl Into<String>,
        password: SecretString,
        attempt: u32,
    ) -> Self {
        Self {
            protocol,
            username: username.into(),
            password,
            attempt,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("imap".parse::<Protocol>(), Ok(Protocol::Imap));
        assert_eq!("smtp".parse::<Protocol>(), Ok(Protocol::Smtp));
        assert_eq!(
            "pop3".parse::<Protocol>(),
            Err(ParseProtocolError("pop3".to_string()))
        );
        // Case matters: the proxy always sends lowercase.
        assert!("IMAP".parse::<Protocol>().is_err());
        assert!("".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Imap.to_string(), "imap");
        assert_eq!(Protocol::Smtp.to_string(), "smtp");
    }

    #[test]
    fn test_request_debug_hides_password() {
        let request = AuthRequest::new(Protocol::Imap, "foo", "hunter2".into(), 1);
        let debug = format!("{request:?}");

        assert!(debug.contains("foo"));
        assert!(!debug.contains("hunter2"));
    }
}
