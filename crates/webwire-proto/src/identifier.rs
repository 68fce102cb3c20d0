//! Opaque request/reply correlation identifier.

use std::fmt;

/// An 8-byte value correlating a [`crate::Message::Request`] with its
/// eventual [`crate::Message::Reply`] or [`crate::Message::ErrorReply`].
///
/// Generated randomly by the originator of a request (see
/// `webwire_core::RequestRegistry`); unique within a connection over its
/// outstanding set. This crate only carries the bytes — generation and
/// collision-avoidance live in `webwire-core`, which has access to the
/// `Environment` abstraction's randomness.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageIdentifier([u8; 8]);

impl MessageIdentifier {
    /// Size of the identifier on the wire.
    pub const SIZE: usize = 8;

    /// Wrap raw bytes as an identifier.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the identifier.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageIdentifier({self})")
    }
}

impl fmt::Display for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
