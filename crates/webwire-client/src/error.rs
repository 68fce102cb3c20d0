//! Client-side error type.
//!
//! Mirrors `webwire-server::ServerError`'s split between transport/state
//! errors local to this side and [`WireError`], the operational-error type
//! shared with the wire/session machinery.

use thiserror::Error;
use webwire_core::WireError;

/// Errors that can occur while using a [`crate::Client`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// An operation that requires a live connection (`Request`, `Signal`,
    /// `RestoreSession`) was attempted while disconnected.
    #[error("not connected")]
    NotConnected,

    /// `connect()` was called while already connected or connecting.
    #[error("already connected")]
    AlreadyConnected,

    /// `connect()` was called after [`crate::Client::disable`].
    #[error("client is disabled")]
    Disabled,

    /// The transport handshake or an I/O operation on it failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire-level error surfaced from the session/request machinery. See
    /// [`WireError`] for details.
    #[error(transparent)]
    Wire(#[from] WireError),
}
