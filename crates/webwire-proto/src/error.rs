//! Protocol violation errors.
//!
//! These are the only errors a peer can provoke by sending bad bytes. They
//! are never panics: a [`ProtocolError`] closes the offending connection
//! (see `webwire-server`'s dispatch loop) but never aborts the process.

use thiserror::Error;

/// A malformed or disallowed frame was received.
///
/// Every variant corresponds to a validation rule from the wire layout.
/// Constructing a [`crate::Message`] from trusted, programmer-supplied data
/// never produces this type — see the crate-level docs for the
/// programmer-error/protocol-violation split.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is shorter than the minimum size for its declared tag.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum size required.
        expected: usize,
        /// Size actually received.
        actual: usize,
    },

    /// First byte does not correspond to any known message tag.
    #[error("unrecognized message tag: {0:#04x}")]
    UnknownTag(u8),

    /// `nameLen` was 0 where the layout requires a non-empty name.
    #[error("name length must be in [1,255], got 0")]
    EmptyName,

    /// A name or error-code byte fell outside the printable ASCII range.
    #[error("byte {byte:#04x} at offset {offset} is outside printable ASCII [32,126]")]
    ByteOutOfRange {
        /// The offending byte.
        byte: u8,
        /// Its offset within the name/code field.
        offset: usize,
    },

    /// Declared `codeLen` was 0 (ErrorReply requires a non-empty code).
    #[error("error code must be non-empty")]
    EmptyErrorCode,

    /// A Utf16 payload has an odd byte length.
    #[error("utf16 payload has odd length {0}")]
    OddUtf16Length(usize),

    /// The expected single zero padding byte before a Utf16 payload was
    /// missing or the payload did not land on an even offset after it was
    /// applied.
    #[error("utf16 payload misaligned: expected padding before offset {offset}")]
    MisalignedUtf16 {
        /// Offset within the frame where the payload was expected to start.
        offset: usize,
    },
}
