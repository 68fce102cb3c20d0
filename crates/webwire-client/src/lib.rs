//! `webwire` protocol client.
//!
//! Dual of `webwire-server`'s `Connection`: initiates
//! `Connect`/`Request`/`Signal`/`RestoreSession`/`CloseSession` against a
//! server rather than accepting them. Session lifecycle and request/reply
//! correlation reuse the same `webwire-core` machinery the server uses.
//!
//! # Architecture
//!
//! - [`Client`]: connection state machine, request registry, session
//!   tracking, and optional lifecycle hooks.
//! - [`ClientHooks`]: callback-driven observers for session/connection
//!   lifecycle events, registered at construction.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, [`Client::connect`] performs a
//! WebSocket handshake and spawns the reader/writer task pair that drive
//! the state machine.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;

#[cfg(feature = "transport")]
mod transport;

pub use client::{Client, ClientConfig, ClientHooks, ClientSession, ReconnectPolicy, Status};
pub use error::ClientError;
#[cfg(feature = "transport")]
pub use transport::{WsConnection, WsReceiver, WsSender};
