//! Server error types.

use thiserror::Error;
use webwire_core::WireError;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (connection failure, I/O error, handshake
    /// failure, etc.).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire-level error surfaced from the session/request machinery. See
    /// [`WireError`] for details.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
