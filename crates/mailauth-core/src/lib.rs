//! # mailauth-core
//!
//! The decision engine behind the `mailauth` delegate.
//!
//! Given an [`AuthRequest`] (protocol, username, password, attempt number)
//! the [`AuthDecisionEngine`] decides whether the mail proxy may let the
//! client through, and where to:
//!
//! 1. usernames outside the whitelist are rejected outright;
//! 2. a [`CredentialCache`] of recently confirmed, bcrypt-hashed passwords
//!    answers repeat logins without touching the network;
//! 3. everything else is checked against the mailbox server through a
//!    [`CredentialValidator`] (in production, [`service::ImapValidator`]).
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailauth_core::{AuthConfig, AuthDecisionEngine, AuthRequest, Protocol};
//! use mailauth_core::service::ImapValidator;
//!
//! let engine = AuthDecisionEngine::new(config, Arc::new(ImapValidator::default()));
//! let response = engine
//!     .decide(&AuthRequest::new(Protocol::Imap, "foo", "bar".into(), 1))
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod engine;
mod error;
pub mod request;
pub mod response;
pub mod service;
pub mod validator;

pub use cache::{CacheLookup, CredentialCache};
pub use engine::{AuthConfig, AuthDecisionEngine};
pub use error::{Error, Result};
pub use request::{AuthRequest, ParseProtocolError, Protocol};
pub use response::{AuthResponse, Rejection, RelayIdentity, RetryAfter, Upstream};
pub use validator::{CredentialValidator, ValidationOutcome};
