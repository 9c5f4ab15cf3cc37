use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::TransportError;

/// Opens, drives, and closes request/reply connections.
///
/// One `Transport` value is shared by every session of a run; each session
/// exclusively owns the `Connection` handles it opens.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Opens a new connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns a connect-stage error when the peer cannot be reached or the
    /// handshake does not finish within `timeout`.
    async fn open(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<Self::Connection, TransportError>;

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a send-stage error when the message cannot be written.
    async fn send(
        &self,
        connection: &mut Self::Connection,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Waits for the next reply message.
    ///
    /// # Errors
    ///
    /// Returns a receive-stage error when the read fails, times out, or the
    /// peer closes the connection.
    async fn receive(&self, connection: &mut Self::Connection) -> Result<Vec<u8>, TransportError>;

    /// Closes the connection, consuming the handle.
    ///
    /// # Errors
    ///
    /// Returns a close-stage error when the close handshake fails.
    async fn close(&self, connection: Self::Connection) -> Result<(), TransportError>;
}
