//! Wire protocol for the webwire request/reply and signal messaging
//! framework.
//!
//! This crate owns exactly one concern: the byte layout of messages
//! exchanged over a message-framed transport (canonically WebSocket). It
//! knows nothing about sessions, connections, or scheduling — those live in
//! [`webwire_core`](https://docs.rs/webwire-core).
//!
//! # Message families
//!
//! Every frame is a single message of one type, tagged by its first byte.
//! See [`Message`] for the five families (Signal, Request, Reply,
//! SpecialRequestReply, ErrorReply) and [`Message::encode`] /
//! [`Message::decode`] for the canonical layout of each.
//!
//! # Programmer errors vs protocol violations
//!
//! Constructors that take caller-supplied data (`Message::new_request`,
//! `new_signal`, `new_error_reply`, `new_special_reply`) panic on invalid
//! input — these are bugs in the calling code, never a fact about the
//! network. `Message::decode`, by contrast, treats its input as untrusted
//! and returns a [`ProtocolError`] for every malformed case. Never promote
//! one into the other.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod identifier;
mod message;
mod name;
mod payload;

pub use error::ProtocolError;
pub use identifier::MessageIdentifier;
pub use message::{Message, Tag};
pub use name::{ErrorCode, MessageName};
pub use payload::{Encoding, Payload};

/// Result alias used throughout this crate's parsing paths.
pub type Result<T> = std::result::Result<T, ProtocolError>;
