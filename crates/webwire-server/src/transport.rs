//! WebSocket transport.
//!
//! Canonical transport: WebSocket message-framed binary. Any transport
//! delivering whole frames in order suffices, so this module
//! is kept small and isolated behind [`WsListener`]/[`WsConnection`] —
//! swapping in another framed transport means providing alternative
//! implementations of the same two types.

use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message as WsMessage, WebSocketStream};

use crate::error::ServerError;

/// Listens for incoming TCP connections and upgrades each to a WebSocket.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    /// Bind to `address` (e.g. `"0.0.0.0:9443"`).
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::Config(format!("failed to bind '{address}': {e}")))?;
        tracing::info!(%address, "websocket transport bound");
        Ok(Self { listener })
    }

    /// Accept the next connection and perform the WebSocket handshake.
    pub async fn accept(&self) -> Result<WsConnection, ServerError> {
        let (stream, remote_addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))?;

        stream
            .set_nodelay(true)
            .map_err(|e| ServerError::Transport(format!("set_nodelay failed: {e}")))?;

        let inner = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| ServerError::Transport(format!("websocket handshake failed: {e}")))?;

        Ok(WsConnection { inner, remote_addr })
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}

/// A single accepted, already-handshaken WebSocket connection.
///
/// Binary frames carry wire messages verbatim; text, ping, pong, and close
/// frames never reach the protocol layer.
pub struct WsConnection {
    inner: WebSocketStream<TcpStream>,
    remote_addr: SocketAddr,
}

impl WsConnection {
    /// Read the next binary wire frame. Returns `Ok(None)` once the peer
    /// closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ServerError> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_text_or_ping_or_pong)) => continue,
                Some(Err(e)) => return Err(ServerError::Transport(e.to_string())),
            }
        }
    }

    /// Write a single binary wire frame.
    pub async fn send(&mut self, frame: Bytes) -> Result<(), ServerError> {
        self.inner
            .send(WsMessage::Binary(frame))
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))
    }

    /// Gracefully close the connection.
    pub async fn close(&mut self) -> Result<(), ServerError> {
        self.inner.close(None).await.map_err(|e| ServerError::Transport(e.to_string()))
    }

    /// The peer's socket address.
    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Split into an independent read half and write half, so a
    /// connection's reader and writer can run as separate tasks: each
    /// connection has two logical tasks, an inbound reader and an
    /// outbound writer.
    #[must_use]
    pub fn split(self) -> (WsSender, WsReceiver) {
        let (sink, stream) = self.inner.split();
        (WsSender { sink }, WsReceiver { stream, remote_addr: self.remote_addr })
    }
}

/// The write half of a split [`WsConnection`].
pub struct WsSender {
    sink: futures_util::stream::SplitSink<WebSocketStream<TcpStream>, WsMessage>,
}

impl WsSender {
    /// Write a single binary wire frame.
    pub async fn send(&mut self, frame: Bytes) -> Result<(), ServerError> {
        self.sink
            .send(WsMessage::Binary(frame))
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))
    }

    /// Gracefully close the connection.
    pub async fn close(&mut self) -> Result<(), ServerError> {
        self.sink.close().await.map_err(|e| ServerError::Transport(e.to_string()))
    }
}

/// The read half of a split [`WsConnection`].
pub struct WsReceiver {
    stream: futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    remote_addr: SocketAddr,
}

impl WsReceiver {
    /// Read the next binary wire frame. Returns `Ok(None)` once the peer
    /// closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ServerError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_text_or_ping_or_pong)) => continue,
                Some(Err(e)) => return Err(ServerError::Transport(e.to_string())),
            }
        }
    }

    /// The peer's socket address.
    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
