//! IMAP command builders.
//!
//! Only the commands needed to check a login are supported.

mod serialize;
mod tag_generator;

pub use serialize::{is_quotable, needs_literal, write_astring, write_literal_header};
pub use tag_generator::TagGenerator;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// LOGOUT command.
    Logout,
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
}

impl Command {
    /// Returns the command name, for logging.
    ///
    /// The arguments are deliberately left out so credentials never reach
    /// a log line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
        }
    }

    /// Serializes the command with the given tag, including the trailing CRLF.
    ///
    /// The command is split after every literal announcement. Each segment
    /// but the first may only be sent once the server has asked for it with
    /// a continuation request.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut segments = Vec::new();
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability | Self::Logout | Self::StartTls => {
                buf.extend_from_slice(self.name().as_bytes());
            }
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN");
                for arg in [username, password] {
                    buf.push(b' ');
                    if needs_literal(arg) {
                        write_literal_header(&mut buf, arg.len());
                        segments.push(std::mem::take(&mut buf));
                        buf.extend_from_slice(arg.as_bytes());
                    } else {
                        write_astring(&mut buf, arg);
                    }
                }
            }
        }

        buf.extend_from_slice(b"\r\n");
        segments.push(buf);
        segments
    }
}
