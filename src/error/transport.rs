use std::time::Duration;

use thiserror::Error;

/// Which transport operation failed. Drives the session's recovery choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Connect,
    Send,
    Receive,
    Close,
}

impl ErrorStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorStage::Connect => "connect",
            ErrorStage::Send => "send",
            ErrorStage::Receive => "receive",
            ErrorStage::Close => "close",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect to '{url}': {reason}")]
    Connect { url: String, reason: String },
    #[error("Connect to '{url}' timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },
    #[error("Failed to send message: {reason}")]
    Send { reason: String },
    #[error("Failed to receive reply: {reason}")]
    Receive { reason: String },
    #[error("No reply within {timeout:?}")]
    ReceiveTimeout { timeout: Duration },
    #[error("Connection closed by peer")]
    ConnectionClosed,
    #[error("Failed to close connection: {reason}")]
    Close { reason: String },
}

impl TransportError {
    #[must_use]
    pub const fn stage(&self) -> ErrorStage {
        match self {
            TransportError::Connect { .. } | TransportError::ConnectTimeout { .. } => {
                ErrorStage::Connect
            }
            TransportError::Send { .. } => ErrorStage::Send,
            TransportError::Receive { .. }
            | TransportError::ReceiveTimeout { .. }
            | TransportError::ConnectionClosed => ErrorStage::Receive,
            TransportError::Close { .. } => ErrorStage::Close,
        }
    }

    /// Send and receive failures are recovered by reconnecting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.stage(), ErrorStage::Send | ErrorStage::Receive)
    }
}
