//! Validated ASCII string types shared by the wire layout: message names and
//! error codes.

use std::fmt;

use crate::{ProtocolError, Result};

const PRINTABLE_ASCII: std::ops::RangeInclusive<u8> = 32..=126;

fn validate_ascii(bytes: &[u8]) -> Result<()> {
    for (offset, &byte) in bytes.iter().enumerate() {
        if !PRINTABLE_ASCII.contains(&byte) {
            return Err(ProtocolError::ByteOutOfRange { byte, offset });
        }
    }
    Ok(())
}

/// A request or signal name: 0–255 bytes, each in printable ASCII `[32,126]`.
///
/// Empty names are permitted for replies/internal messages but forbidden
/// wherever a named operation is required — that constraint is enforced by
/// [`crate::Message::new_request`] / [`crate::Message::new_signal`], not by
/// this type itself, since an empty `MessageName` is independently valid
/// (e.g. it never appears on the wire for replies, which carry no name at
/// all).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageName(String);

impl MessageName {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 255;

    /// Validate and wrap a name from untrusted wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ByteOutOfRange`] if any byte is outside
    /// `[32,126]`. Length is bounded by the 1-byte `nameLen` field and thus
    /// cannot exceed 255 by construction of the caller.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        validate_ascii(bytes)?;
        // SAFETY-free: printable ASCII is always valid UTF-8.
        Ok(Self(String::from_utf8(bytes.to_vec()).unwrap_or_default()))
    }

    /// Construct a name from a programmer-supplied string.
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`Self::MAX_LEN`] bytes or contains a
    /// byte outside `[32,126]`. This is a programmer error: a caller should
    /// never hand the framework a name it has not itself chosen.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(
            name.len() <= Self::MAX_LEN,
            "invariant: message name must be at most {} bytes, got {}",
            Self::MAX_LEN,
            name.len()
        );
        for (offset, &byte) in name.as_bytes().iter().enumerate() {
            assert!(
                PRINTABLE_ASCII.contains(&byte),
                "invariant: message name byte {byte:#04x} at offset {offset} is outside printable ASCII [32,126]"
            );
        }
        Self(name)
    }

    /// An empty name (used for replies and internal messages).
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the name is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty error code: 1–255 bytes, each in printable ASCII `[32,126]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode(String);

impl ErrorCode {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 255;

    /// Validate and wrap a code from untrusted wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyErrorCode`] if `bytes` is empty, or
    /// [`ProtocolError::ByteOutOfRange`] if any byte is outside `[32,126]`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ProtocolError::EmptyErrorCode);
        }
        validate_ascii(bytes)?;
        Ok(Self(String::from_utf8(bytes.to_vec()).unwrap_or_default()))
    }

    /// Construct an error code from a programmer-supplied string.
    ///
    /// # Panics
    ///
    /// Panics if `code` is empty, longer than [`Self::MAX_LEN`] bytes, or
    /// contains a byte outside `[32,126]`.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        assert!(!code.is_empty(), "invariant: error code must be non-empty");
        assert!(
            code.len() <= Self::MAX_LEN,
            "invariant: error code must be at most {} bytes, got {}",
            Self::MAX_LEN,
            code.len()
        );
        for (offset, &byte) in code.as_bytes().iter().enumerate() {
            assert!(
                PRINTABLE_ASCII.contains(&byte),
                "invariant: error code byte {byte:#04x} at offset {offset} is outside printable ASCII [32,126]"
            );
        }
        Self(code)
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the code is empty. Always `false` for a validly constructed
    /// `ErrorCode`; present for API symmetry / clippy's `len_without_is_empty`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_full_printable_range() {
        let name = MessageName::new("a".repeat(255));
        assert_eq!(name.len(), 255);
    }

    #[test]
    #[should_panic(expected = "at most 255 bytes")]
    fn name_rejects_256_bytes() {
        let _ = MessageName::new("a".repeat(256));
    }

    #[test]
    #[should_panic(expected = "outside printable ASCII")]
    fn name_rejects_control_byte() {
        let _ = MessageName::new("\u{1f}bad");
    }

    #[test]
    #[should_panic(expected = "outside printable ASCII")]
    fn name_rejects_del_byte() {
        let _ = MessageName::new("\u{7f}bad");
    }

    #[test]
    fn parse_rejects_out_of_range_byte() {
        let err = MessageName::parse(&[0x1f]).unwrap_err();
        assert_eq!(err, ProtocolError::ByteOutOfRange { byte: 0x1f, offset: 0 });
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn error_code_rejects_empty() {
        let _ = ErrorCode::new("");
    }

    #[test]
    #[should_panic(expected = "at most 255 bytes")]
    fn error_code_rejects_256_bytes() {
        let _ = ErrorCode::new("a".repeat(256));
    }

    #[test]
    fn error_code_parse_rejects_empty() {
        assert_eq!(ErrorCode::parse(&[]).unwrap_err(), ProtocolError::EmptyErrorCode);
    }
}
