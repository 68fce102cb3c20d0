//! Encoding-tagged byte payload.

use bytes::Bytes;

/// How a [`Payload`]'s bytes should be interpreted by the application.
///
/// The framework never transcodes between these; the tag is carried on the
/// wire and surfaced verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Uninterpreted bytes.
    Binary,
    /// UTF-8 text.
    Utf8,
    /// UTF-16 text; payload byte length is always even.
    Utf16,
}

/// A pair `(encoding, bytes)`.
///
/// `Utf16` payloads always carry an even number of bytes; `Binary` and
/// `Utf8` payloads are unconstrained (the framework does not validate that
/// `Utf8`-tagged bytes are actually valid UTF-8 — that is the application's
/// concern, mirroring the "encoding tag is opaque to the framework" rule in
/// the data model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    encoding: Encoding,
    bytes: Bytes,
}

impl Payload {
    /// Construct a payload. Panics if `encoding` is [`Encoding::Utf16`] and
    /// `bytes` has an odd length — this is a programmer error, not a
    /// protocol violation, since it can only happen if the caller hands the
    /// framework data it has not itself validated.
    #[must_use]
    pub fn new(encoding: Encoding, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        assert!(
            !(encoding == Encoding::Utf16 && bytes.len() % 2 != 0),
            "invariant: utf16 payload must have an even byte length, got {}",
            bytes.len()
        );
        Self { encoding, bytes }
    }

    /// The payload's encoding tag.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The raw payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the payload, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// True if the payload carries zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_and_utf8_accept_any_length() {
        let _ = Payload::new(Encoding::Binary, vec![1, 2, 3]);
        let _ = Payload::new(Encoding::Utf8, vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "even byte length")]
    fn utf16_rejects_odd_length() {
        let _ = Payload::new(Encoding::Utf16, vec![1, 2, 3]);
    }

    #[test]
    fn utf16_accepts_even_length() {
        let p = Payload::new(Encoding::Utf16, vec![1, 2, 3, 4]);
        assert_eq!(p.len(), 4);
    }
}
