//! Connection capability consumed by sessions.
mod traits;
mod websocket;

#[cfg(test)]
pub(crate) mod scripted;

pub use traits::Transport;
pub use websocket::{WebSocketConnection, WebSocketTransport};
