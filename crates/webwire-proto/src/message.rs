//! Message tags, the `Message` enum, and the wire codec.
//!
//! # Layout by family
//!
//! - *Signal* `[tag(1) | nameLen(1) | name(nameLen) | pad-to-encoding | payload(rest)]`
//! - *Request* `[tag(1) | requestId(8) | nameLen(1) | name(nameLen) | pad-to-encoding | payload(rest)]`
//! - *Reply* `[tag(1) | requestId(8) | pad-to-encoding | payload(rest)]`
//! - *Special-request reply* `[tag(1) | requestId(8)]`, exactly 9 bytes
//! - *Error reply* `[tag(1) | requestId(8) | codeLen(1) | code(codeLen) | message(rest)]`
//!
//! `pad-to-encoding` is a single zero byte, present only for `Utf16`-encoded
//! messages, inserted exactly when the payload would otherwise begin on an
//! odd offset relative to the start of the frame. UTF-16 decoders require
//! 2-byte alignment; this keeps the payload aligned without the codec
//! needing to know the target encoding's unit size.

use bytes::{BufMut, Bytes};

use crate::{Encoding, ErrorCode, MessageIdentifier, MessageName, Payload, ProtocolError, Result};

/// The one-byte tag identifying a frame's message family and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Signal, binary payload.
    SignalBinary = 0x01,
    /// Signal, UTF-8 payload.
    SignalUtf8 = 0x02,
    /// Signal, UTF-16 payload.
    SignalUtf16 = 0x03,
    /// Request, binary payload.
    RequestBinary = 0x10,
    /// Request, UTF-8 payload.
    RequestUtf8 = 0x11,
    /// Request, UTF-16 payload.
    RequestUtf16 = 0x12,
    /// Reply, binary payload.
    ReplyBinary = 0x20,
    /// Reply, UTF-8 payload.
    ReplyUtf8 = 0x21,
    /// Reply, UTF-16 payload.
    ReplyUtf16 = 0x22,
    /// Acknowledges a successful `CreateSession`.
    SessionCreated = 0x30,
    /// Notifies a connection that its session was destroyed.
    SessionClosed = 0x31,
    /// Acknowledges a successful `RestoreSession`.
    RestoreSession = 0x32,
    /// Acknowledges a successful client-initiated `CloseSession`.
    CloseSession = 0x33,
    /// Carries an application or framework error for a specific request.
    ErrorReply = 0x40,
}

impl Tag {
    /// Map a raw byte to a known tag.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::SignalBinary,
            0x02 => Self::SignalUtf8,
            0x03 => Self::SignalUtf16,
            0x10 => Self::RequestBinary,
            0x11 => Self::RequestUtf8,
            0x12 => Self::RequestUtf16,
            0x20 => Self::ReplyBinary,
            0x21 => Self::ReplyUtf8,
            0x22 => Self::ReplyUtf16,
            0x30 => Self::SessionCreated,
            0x31 => Self::SessionClosed,
            0x32 => Self::RestoreSession,
            0x33 => Self::CloseSession,
            0x40 => Self::ErrorReply,
            _ => return None,
        })
    }

    /// True if this tag belongs to the special-request-reply set (no
    /// payload, carries only a request id).
    #[must_use]
    pub const fn is_special_reply(self) -> bool {
        matches!(
            self,
            Self::SessionCreated | Self::SessionClosed | Self::RestoreSession | Self::CloseSession
        )
    }

    const fn signal_tag(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::SignalBinary,
            Encoding::Utf8 => Self::SignalUtf8,
            Encoding::Utf16 => Self::SignalUtf16,
        }
    }

    const fn request_tag(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::RequestBinary,
            Encoding::Utf8 => Self::RequestUtf8,
            Encoding::Utf16 => Self::RequestUtf16,
        }
    }

    const fn reply_tag(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::ReplyBinary,
            Encoding::Utf8 => Self::ReplyUtf8,
            Encoding::Utf16 => Self::ReplyUtf16,
        }
    }

    const fn encoding(self) -> Encoding {
        match self {
            Self::SignalBinary | Self::RequestBinary | Self::ReplyBinary => Encoding::Binary,
            Self::SignalUtf8 | Self::RequestUtf8 | Self::ReplyUtf8 => Encoding::Utf8,
            Self::SignalUtf16 | Self::RequestUtf16 | Self::ReplyUtf16 => Encoding::Utf16,
            Self::SessionCreated
            | Self::SessionClosed
            | Self::RestoreSession
            | Self::CloseSession
            | Self::ErrorReply => Encoding::Binary,
        }
    }
}

/// A single parsed or to-be-encoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One-way message; no reply expected.
    Signal {
        /// Operation name.
        name: MessageName,
        /// Message body.
        payload: Payload,
    },
    /// Correlated request awaiting a [`Message::Reply`] or
    /// [`Message::ErrorReply`] carrying the same `id`.
    Request {
        /// Correlation id.
        id: MessageIdentifier,
        /// Operation name.
        name: MessageName,
        /// Message body.
        payload: Payload,
    },
    /// Successful reply to a [`Message::Request`].
    Reply {
        /// Correlation id, matching the originating request.
        id: MessageIdentifier,
        /// Reply body.
        payload: Payload,
    },
    /// Fixed 9-byte acknowledgement of a session-control request.
    SpecialRequestReply {
        /// Which session-control operation this acknowledges.
        tag: Tag,
        /// Correlation id, matching the originating request.
        id: MessageIdentifier,
    },
    /// Error reply to a [`Message::Request`].
    ErrorReply {
        /// Correlation id, matching the originating request.
        id: MessageIdentifier,
        /// Machine-readable error code.
        code: ErrorCode,
        /// Free-form human-readable detail.
        message: String,
    },
}

fn utf16_pad_len(offset_before_payload: usize, encoding: Encoding) -> usize {
    usize::from(encoding == Encoding::Utf16 && offset_before_payload % 2 != 0)
}

impl Message {
    /// Build a [`Message::Signal`].
    ///
    /// # Panics
    ///
    /// Panics if `name` violates the `[1,255]`-byte printable-ASCII rule
    /// (enforced by [`MessageName::new`]) — name length `0` is never valid
    /// for a signal.
    #[must_use]
    pub fn new_signal(name: impl Into<String>, payload: Payload) -> Self {
        let name = MessageName::new(name);
        assert!(!name.is_empty(), "invariant: signal name must not be empty");
        Self::Signal { name, payload }
    }

    /// Build a [`Message::Request`].
    ///
    /// # Panics
    ///
    /// Panics if `name` is non-empty but invalid (per [`MessageName::new`]),
    /// or if both `name` and `payload` are empty — a request must carry at
    /// least one of the two.
    #[must_use]
    pub fn new_request(id: MessageIdentifier, name: impl Into<String>, payload: Payload) -> Self {
        let name = name.into();
        assert!(
            !(name.is_empty() && payload.is_empty()),
            "invariant: request must carry a non-empty name or a non-empty payload"
        );
        let name = MessageName::new(name);
        Self::Request { id, name, payload }
    }

    /// Build a [`Message::Reply`].
    #[must_use]
    pub const fn new_reply(id: MessageIdentifier, payload: Payload) -> Self {
        Self::Reply { id, payload }
    }

    /// Build a [`Message::SpecialRequestReply`].
    ///
    /// # Panics
    ///
    /// Panics if `tag` is not one of `SessionCreated`, `SessionClosed`,
    /// `RestoreSession`, `CloseSession`.
    #[must_use]
    pub fn new_special_reply(tag: Tag, id: MessageIdentifier) -> Self {
        assert!(
            tag.is_special_reply(),
            "invariant: {tag:?} is not a valid special-request-reply tag"
        );
        Self::SpecialRequestReply { tag, id }
    }

    /// Build a [`Message::ErrorReply`].
    ///
    /// # Panics
    ///
    /// Panics if `code` is empty, longer than 255 bytes, or contains a byte
    /// outside `[32,126]` (enforced by [`ErrorCode::new`]).
    #[must_use]
    pub fn new_error_reply(
        id: MessageIdentifier,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = ErrorCode::new(code);
        Self::ErrorReply { id, code, message: message.into() }
    }

    /// Encode this message to its canonical wire form.
    ///
    /// # Errors
    ///
    /// Never fails for a `Message` built through the constructors above —
    /// they already enforce every invariant the layout depends on. Returns
    /// `Result` rather than panicking defensively so callers that construct
    /// a `Message` by hand (e.g. fuzzing/property tests) get the same
    /// [`ProtocolError`] a peer's malformed bytes would.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        match self {
            Self::Signal { name, payload } => {
                let tag = Tag::signal_tag(payload.encoding());
                buf.put_u8(tag as u8);
                encode_name(&mut buf, name)?;
                let pad = utf16_pad_len(buf.len(), payload.encoding());
                buf.resize(buf.len() + pad, 0);
                buf.extend_from_slice(payload.data());
            },
            Self::Request { id, name, payload } => {
                let tag = Tag::request_tag(payload.encoding());
                buf.put_u8(tag as u8);
                buf.extend_from_slice(id.as_bytes());
                encode_name(&mut buf, name)?;
                let pad = utf16_pad_len(buf.len(), payload.encoding());
                buf.resize(buf.len() + pad, 0);
                buf.extend_from_slice(payload.data());
            },
            Self::Reply { id, payload } => {
                let tag = Tag::reply_tag(payload.encoding());
                buf.put_u8(tag as u8);
                buf.extend_from_slice(id.as_bytes());
                let pad = utf16_pad_len(buf.len(), payload.encoding());
                buf.resize(buf.len() + pad, 0);
                buf.extend_from_slice(payload.data());
            },
            Self::SpecialRequestReply { tag, id } => {
                buf.put_u8(*tag as u8);
                buf.extend_from_slice(id.as_bytes());
            },
            Self::ErrorReply { id, code, message } => {
                buf.put_u8(Tag::ErrorReply as u8);
                buf.extend_from_slice(id.as_bytes());
                let code_bytes = code.as_str().as_bytes();
                buf.put_u8(u8::try_from(code_bytes.len()).unwrap_or(255));
                buf.extend_from_slice(code_bytes);
                buf.extend_from_slice(message.as_bytes());
            },
        }
        Ok(Bytes::from(buf))
    }

    /// Parse a message from untrusted transport bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for any malformed frame: unknown tag, short
    /// frame, invalid name/code length, out-of-range bytes, or a misaligned
    /// UTF-16 payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let &tag_byte = bytes
            .first()
            .ok_or(ProtocolError::FrameTooShort { expected: 1, actual: 0 })?;
        let tag = Tag::from_u8(tag_byte).ok_or(ProtocolError::UnknownTag(tag_byte))?;

        match tag {
            Tag::SignalBinary | Tag::SignalUtf8 | Tag::SignalUtf16 => {
                let (name, payload) = decode_named(bytes, 1, tag.encoding())?;
                if name.is_empty() {
                    return Err(ProtocolError::EmptyName);
                }
                Ok(Self::Signal { name, payload })
            },
            Tag::RequestBinary | Tag::RequestUtf8 | Tag::RequestUtf16 => {
                let id = decode_id(bytes, 1)?;
                let (name, payload) = decode_named(bytes, 9, tag.encoding())?;
                if name.is_empty() && payload.is_empty() {
                    return Err(ProtocolError::EmptyName);
                }
                Ok(Self::Request { id, name, payload })
            },
            Tag::ReplyBinary | Tag::ReplyUtf8 | Tag::ReplyUtf16 => {
                let id = decode_id(bytes, 1)?;
                let payload = decode_unnamed_payload(bytes, 9, tag.encoding())?;
                Ok(Self::Reply { id, payload })
            },
            Tag::SessionCreated | Tag::SessionClosed | Tag::RestoreSession | Tag::CloseSession => {
                if bytes.len() != 9 {
                    return Err(ProtocolError::FrameTooShort { expected: 9, actual: bytes.len() });
                }
                let id = decode_id(bytes, 1)?;
                Ok(Self::SpecialRequestReply { tag, id })
            },
            Tag::ErrorReply => {
                let id = decode_id(bytes, 1)?;
                let code_len_offset = 9;
                let &code_len = bytes
                    .get(code_len_offset)
                    .ok_or(ProtocolError::FrameTooShort { expected: 10, actual: bytes.len() })?;
                let code_len = code_len as usize;
                if code_len == 0 {
                    return Err(ProtocolError::EmptyErrorCode);
                }
                let code_start = code_len_offset + 1;
                let code_end = code_start + code_len;
                let code_bytes = bytes.get(code_start..code_end).ok_or(
                    ProtocolError::FrameTooShort { expected: code_end, actual: bytes.len() },
                )?;
                let code = ErrorCode::parse(code_bytes)?;
                let message = String::from_utf8_lossy(&bytes[code_end..]).into_owned();
                Ok(Self::ErrorReply { id, code, message })
            },
        }
    }
}

fn decode_id(bytes: &[u8], offset: usize) -> Result<MessageIdentifier> {
    let end = offset + MessageIdentifier::SIZE;
    let slice = bytes
        .get(offset..end)
        .ok_or(ProtocolError::FrameTooShort { expected: end, actual: bytes.len() })?;
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(slice);
    Ok(MessageIdentifier::from_bytes(id_bytes))
}

fn encode_name(buf: &mut Vec<u8>, name: &MessageName) -> Result<()> {
    let name_bytes = name.as_str().as_bytes();
    buf.put_u8(u8::try_from(name_bytes.len()).unwrap_or(255));
    buf.extend_from_slice(name_bytes);
    Ok(())
}

/// Decode a `nameLen | name | pad | payload` tail starting at `name_len_offset`.
fn decode_named(
    bytes: &[u8],
    name_len_offset: usize,
    encoding: Encoding,
) -> Result<(MessageName, Payload)> {
    let &name_len = bytes
        .get(name_len_offset)
        .ok_or(ProtocolError::FrameTooShort { expected: name_len_offset + 1, actual: bytes.len() })?;
    let name_len = name_len as usize;
    let name_start = name_len_offset + 1;
    let name_end = name_start + name_len;
    let name_bytes = bytes
        .get(name_start..name_end)
        .ok_or(ProtocolError::FrameTooShort { expected: name_end, actual: bytes.len() })?;
    let name = if name_len == 0 { MessageName::empty() } else { MessageName::parse(name_bytes)? };

    let payload = decode_unnamed_payload(bytes, name_end, encoding)?;
    Ok((name, payload))
}

/// Decode a `pad | payload` tail starting at `offset`, validating UTF-16
/// alignment and parity.
fn decode_unnamed_payload(bytes: &[u8], offset: usize, encoding: Encoding) -> Result<Payload> {
    if encoding != Encoding::Utf16 {
        let data = bytes
            .get(offset..)
            .ok_or(ProtocolError::FrameTooShort { expected: offset, actual: bytes.len() })?;
        return Ok(Payload::new(encoding, data.to_vec()));
    }

    let needs_pad = offset % 2 != 0;
    let payload_start = if needs_pad {
        let &pad_byte = bytes
            .get(offset)
            .ok_or(ProtocolError::MisalignedUtf16 { offset: offset + 1 })?;
        if pad_byte != 0 {
            return Err(ProtocolError::MisalignedUtf16 { offset: offset + 1 });
        }
        offset + 1
    } else {
        offset
    };

    let data = bytes
        .get(payload_start..)
        .ok_or(ProtocolError::FrameTooShort { expected: payload_start, actual: bytes.len() })?;
    if data.len() % 2 != 0 {
        return Err(ProtocolError::OddUtf16Length(data.len()));
    }
    Ok(Payload::new(Encoding::Utf16, data.to_vec()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(n: u8) -> MessageIdentifier {
        MessageIdentifier::from_bytes([n; 8])
    }

    #[test]
    fn signal_binary_round_trips() {
        let msg = Message::new_signal("ping", Payload::new(Encoding::Binary, vec![1, 2, 3]));
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn request_utf8_round_trips() {
        let msg = Message::new_request(id(7), "login", Payload::new(Encoding::Utf8, b"hi".to_vec()));
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn reply_utf16_inserts_padding_byte() {
        // tag(1) + id(8) = 9 bytes before payload: always odd, so Reply/Utf16
        // always carries exactly one pad byte.
        let msg = Message::new_reply(id(1), Payload::new(Encoding::Utf16, vec![0, 1, 0, 2]));
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), 1 + 8 + 1 + 4);
        assert_eq!(bytes[9], 0, "pad byte must be zero");
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn signal_utf16_pads_only_when_name_len_is_even() {
        // name "ab" -> 1(tag)+1(nameLen)+2(name) = 4, even: no pad needed.
        let even = Message::new_signal("ab", Payload::new(Encoding::Utf16, vec![9, 9]));
        let even_bytes = even.encode().unwrap();
        assert_eq!(even_bytes.len(), 1 + 1 + 2 + 2);

        // name "abc" -> 1+1+3 = 5, odd: one pad byte inserted.
        let odd = Message::new_signal("abc", Payload::new(Encoding::Utf16, vec![9, 9]));
        let odd_bytes = odd.encode().unwrap();
        assert_eq!(odd_bytes.len(), 1 + 1 + 3 + 1 + 2);
        assert_eq!(odd_bytes[5], 0);

        assert_eq!(Message::decode(&even_bytes).unwrap(), even);
        assert_eq!(Message::decode(&odd_bytes).unwrap(), odd);
    }

    #[test]
    fn special_request_reply_round_trips() {
        let msg = Message::new_special_reply(Tag::RestoreSession, id(42));
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    #[should_panic(expected = "not a valid special-request-reply tag")]
    fn special_request_reply_rejects_non_special_tag() {
        let _ = Message::new_special_reply(Tag::ErrorReply, id(1));
    }

    #[test]
    fn error_reply_round_trips() {
        let msg = Message::new_error_reply(id(3), "session_not_found", "no such session");
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    #[should_panic(expected = "must carry a non-empty name or a non-empty payload")]
    fn request_rejects_empty_name_and_payload() {
        let _ = Message::new_request(id(1), "", Payload::new(Encoding::Binary, Vec::new()));
    }

    #[test]
    #[should_panic(expected = "at most 255 bytes")]
    fn request_rejects_oversized_name() {
        let _ = Message::new_request(id(1), "a".repeat(256), Payload::new(Encoding::Binary, vec![1]));
    }

    #[test]
    #[should_panic(expected = "outside printable ASCII")]
    fn request_rejects_control_byte_in_name() {
        let _ =
            Message::new_request(id(1), "\u{1f}", Payload::new(Encoding::Binary, Vec::new()));
    }

    #[test]
    #[should_panic(expected = "outside printable ASCII")]
    fn signal_rejects_del_byte_in_name() {
        let _ = Message::new_signal("\u{7f}", Payload::new(Encoding::Binary, vec![1]));
    }

    #[test]
    #[should_panic(expected = "at most 255 bytes")]
    fn signal_rejects_oversized_name() {
        let _ = Message::new_signal("a".repeat(256), Payload::new(Encoding::Binary, vec![1]));
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn error_reply_rejects_empty_code() {
        let _ = Message::new_error_reply(id(1), "", "msg");
    }

    #[test]
    #[should_panic(expected = "at most 255 bytes")]
    fn error_reply_rejects_oversized_code() {
        let _ = Message::new_error_reply(id(1), "a".repeat(256), "msg");
    }

    #[test]
    #[should_panic(expected = "outside printable ASCII")]
    fn error_reply_rejects_control_byte_in_code() {
        let _ = Message::new_error_reply(id(1), "\u{1f}", "msg");
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        assert_eq!(Message::decode(&[0xff]).unwrap_err(), ProtocolError::UnknownTag(0xff));
    }

    #[test]
    fn decode_rejects_short_frame() {
        assert_eq!(
            Message::decode(&[]).unwrap_err(),
            ProtocolError::FrameTooShort { expected: 1, actual: 0 }
        );
    }

    #[test]
    fn decode_rejects_non_special_tag_for_nine_byte_frame() {
        // ErrorReply tag with only 9 bytes total is not special-reply shaped;
        // it should fail on the missing codeLen byte, not be silently
        // accepted as a special reply.
        let mut bytes = vec![Tag::ErrorReply as u8];
        bytes.extend_from_slice(id(1).as_bytes());
        assert!(Message::decode(&bytes).is_err());
    }
}
