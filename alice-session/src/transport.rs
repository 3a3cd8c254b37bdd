//! Duplex text channel to the gateway.
//!
//! The session engine only needs "send text / receive text / close", so the
//! socket sits behind [`DuplexChannel`]. A [`Connector`] opens fresh channels;
//! reconnecting after a teardown replaces the channel instance entirely.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{SessionError, SessionResult};

/// What the channel yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    /// The peer closed the connection.
    Closed { reason: Option<String> },
}

/// Persistent bidirectional text-message transport.
#[async_trait]
pub trait DuplexChannel: Send {
    /// Send one whole text frame.
    async fn send_text(&mut self, text: String) -> SessionResult<()>;

    /// Wait for the next text frame.
    async fn recv_text(&mut self) -> SessionResult<Incoming>;

    /// Close the connection. Closing an already closed channel is not an error.
    async fn close(&mut self) -> SessionResult<()>;
}

/// Opens new channels to the gateway.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> SessionResult<Box<dyn DuplexChannel>>;
}

/// Connector for the gateway WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> SessionResult<Box<dyn DuplexChannel>> {
        tracing::debug!(url = %self.url, "Gateway: connecting...");

        let (stream, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| {
            SessionError::Transport(format!(
                "WebSocket connection timed out after {}s",
                self.connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| SessionError::Transport(format!("WebSocket connection failed: {e}")))?;

        Ok(Box::new(WsChannel { stream }))
    }
}

/// WebSocket-backed channel.
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl DuplexChannel for WsChannel {
    async fn send_text(&mut self, text: String) -> SessionResult<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> SessionResult<Incoming> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Incoming::Closed { reason: None }),
            };

            match msg {
                Message::Text(text) => return Ok(Incoming::Text(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Incoming::Text(text)),
                    Err(_) => {
                        tracing::warn!("Gateway: skipping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Message::Close(frame) => {
                    return Ok(Incoming::Closed {
                        reason: frame.map(|f| f.reason.to_string()),
                    })
                }
                // Pings are answered by tungstenite on the next read/write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> SessionResult<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
