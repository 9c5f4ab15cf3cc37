use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::TransportError;

use super::Transport;

pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

/// WebSocket client transport. Text frames carry UTF-8 payloads, binary
/// frames everything else; control frames are skipped while waiting for a
/// reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport {
    receive_timeout: Option<Duration>,
}

impl WebSocketTransport {
    #[must_use]
    pub const fn new(receive_timeout: Option<Duration>) -> Self {
        Self { receive_timeout }
    }

    async fn next_data_frame(
        connection: &mut WebSocketConnection,
    ) -> Result<Vec<u8>, TransportError> {
        loop {
            match connection.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(bytes))) => return Ok(bytes),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Err(err)) => {
                    return Err(TransportError::Receive {
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn open(
        &self,
        url: &Url,
        connect_timeout: Duration,
    ) -> Result<Self::Connection, TransportError> {
        match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, _response))) => Ok(WebSocketConnection { stream }),
            Ok(Err(err)) => Err(TransportError::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_elapsed) => Err(TransportError::ConnectTimeout {
                url: url.to_string(),
                timeout: connect_timeout,
            }),
        }
    }

    async fn send(
        &self,
        connection: &mut Self::Connection,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_not_utf8) => Message::Binary(payload.to_vec()),
        };
        connection
            .stream
            .send(message)
            .await
            .map_err(|err| TransportError::Send {
                reason: err.to_string(),
            })
    }

    async fn receive(&self, connection: &mut Self::Connection) -> Result<Vec<u8>, TransportError> {
        match self.receive_timeout {
            Some(limit) => timeout(limit, Self::next_data_frame(connection))
                .await
                .unwrap_or(Err(TransportError::ReceiveTimeout { timeout: limit })),
            None => Self::next_data_frame(connection).await,
        }
    }

    async fn close(&self, mut connection: Self::Connection) -> Result<(), TransportError> {
        connection
            .stream
            .close(None)
            .await
            .map_err(|err| TransportError::Close {
                reason: err.to_string(),
            })
    }
}
