//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
///
/// None of these ever reach an authentication client: the engine turns
/// every failure into a well-formed rejection and logs the cause.
#[derive(Debug, Error)]
pub enum Error {
    /// Password hashing or verification failed.
    #[error("Hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// A blocking hashing task panicked or was cancelled.
    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
