//! Validator implementations backed by real servers.

mod imap;

pub use imap::{ImapValidator, outcome_from};
pub use mailauth_imap::Security;
