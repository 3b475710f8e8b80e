//! # mailauth-imap
//!
//! A small async IMAP client that does exactly one job well: find out
//! whether a mailbox server accepts a username and password.
//!
//! It speaks just enough of RFC 9051 / RFC 3501 for that: the server
//! greeting, `CAPABILITY`, `STARTTLS`, `LOGIN` and `LOGOUT`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailauth_imap::{Client, Config, Security};
//!
//! #[tokio::main]
//! async fn main() -> mailauth_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .security(Security::Implicit)
//!         .build();
//!     let stream = mailauth_imap::connection::connect(&config).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@example.com", "password").await?;
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── login() ───→ Authenticated ─── logout()
//! └─────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, ImapStream, NotAuthenticated,
    ResponseAccumulator, Security,
};
pub use error::{Error, Result};
pub use parser::{Response, ResponseParser};
pub use types::{Capability, Status};
