//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::Client;
use super::states::Authenticated;
use crate::Result;
use crate::command::Command;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Logs out and closes the connection.
    ///
    /// The stream is shut down even when the server misbehaves during
    /// LOGOUT; the first error encountered is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the LOGOUT exchange fails.
    pub async fn logout(mut self) -> Result<()> {
        let result = self.execute(&Command::Logout).await;

        let mut stream = self.stream.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!("shutdown after LOGOUT failed: {e}");
        }

        result
    }
}
