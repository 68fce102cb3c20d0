//! WebSocket transport (client side).
//!
//! Canonical transport: WebSocket message-framed binary.
//! Mirrors `webwire-server`'s `WsListener`/`WsConnection` split: a single
//! `connect` that performs the handshake, producing a connection that can be
//! `split` into independent sender/receiver halves for the writer and reader
//! tasks [`crate::Client::connect`] spawns.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A single handshaken WebSocket connection to a webwire server.
///
/// Binary frames carry wire messages verbatim; text, ping, pong, and close
/// frames never reach the protocol layer.
pub struct WsConnection {
    inner: WsStream,
}

impl WsConnection {
    /// Connect to `url` (e.g. `"ws://127.0.0.1:9443"`) and perform the
    /// WebSocket handshake.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (inner, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Read the next binary wire frame. Returns `Ok(None)` once the peer
    /// closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ClientError> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_text_or_ping_or_pong)) => continue,
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            }
        }
    }

    /// Write a single binary wire frame.
    pub async fn send(&mut self, frame: Bytes) -> Result<(), ClientError> {
        self.inner.send(WsMessage::Binary(frame)).await.map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Gracefully close the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.inner.close(None).await.map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Split into an independent read half and write half, so the
    /// connection's reader and writer can run as separate tasks, mirroring
    /// the server's per-connection task split.
    #[must_use]
    pub fn split(self) -> (WsSender, WsReceiver) {
        let (sink, stream) = self.inner.split();
        (WsSender { sink }, WsReceiver { stream })
    }
}

/// The write half of a split [`WsConnection`].
pub struct WsSender {
    sink: futures_util::stream::SplitSink<WsStream, WsMessage>,
}

impl WsSender {
    /// Write a single binary wire frame.
    pub async fn send(&mut self, frame: Bytes) -> Result<(), ClientError> {
        self.sink.send(WsMessage::Binary(frame)).await.map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Gracefully close the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.sink.close().await.map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// The read half of a split [`WsConnection`].
pub struct WsReceiver {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReceiver {
    /// Read the next binary wire frame. Returns `Ok(None)` once the peer
    /// closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ClientError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_text_or_ping_or_pong)) => continue,
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            }
        }
    }
}
