//! Operational error types.
//!
//! These propagate through return values and are never panics. Programmer
//! errors are a separate concern, surfaced as `panic!`s at the
//! `webwire-proto` constructors instead.

use thiserror::Error;
use webwire_proto::{ErrorCode, ProtocolError};

/// Runtime conditions the framework surfaces through `Result`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Application-defined request failure, serialized verbatim as an
    /// `ErrorReply`.
    #[error("request error [{code}]: {message}")]
    ReqErr {
        /// Machine-readable error code chosen by the application.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// A request handler returned an error other than [`Self::ReqErr`].
    /// Serialized to the peer as an opaque `internal_server_error` to avoid
    /// leaking implementation detail.
    #[error("internal server error")]
    ReqInternalErr,

    /// The request's deadline elapsed before a reply arrived.
    #[error("request timed out")]
    TimeoutErr,

    /// The connection was closed while a request was outstanding.
    #[error("disconnected")]
    DisconnectedErr,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    TransportErr(String),

    /// A peer sent a malformed frame.
    #[error("protocol violation: {0}")]
    ProtocolViolationErr(#[from] ProtocolError),

    /// `SessionManager::lookup` reported no such session.
    #[error("session not found")]
    SessNotFoundErr,

    /// The session registry's `maxConnectionsPerSession` cap was reached.
    #[error("maximum session connections reached")]
    MaxSessConnsReachedErr,
}

impl WireError {
    /// Well-known wire error code for `session_not_found`.
    pub const SESSION_NOT_FOUND: &'static str = "session_not_found";
    /// Well-known wire error code for `max_sess_conns_reached`.
    pub const MAX_SESS_CONNS_REACHED: &'static str = "max_sess_conns_reached";
    /// Well-known wire error code for `internal_server_error`.
    pub const INTERNAL_SERVER_ERROR: &'static str = "internal_server_error";
    /// Well-known wire error code for `protocol_violation`.
    pub const PROTOCOL_VIOLATION: &'static str = "protocol_violation";

    /// Reconstruct the typed error an inbound `ErrorReply`'s `(code,
    /// message)` maps back to. The inverse of [`Self::wire_code_and_message`]
    /// for the framework's own well-known codes; any other code is an
    /// application-defined [`Self::ReqErr`], carried through verbatim.
    #[must_use]
    pub fn from_wire_code(code: &str, message: String) -> Self {
        match code {
            Self::SESSION_NOT_FOUND => Self::SessNotFoundErr,
            Self::MAX_SESS_CONNS_REACHED => Self::MaxSessConnsReachedErr,
            Self::INTERNAL_SERVER_ERROR => Self::ReqInternalErr,
            _ => Self::ReqErr { code: ErrorCode::new(code), message },
        }
    }

    /// The wire error code and message this error maps to when serialized
    /// as an `ErrorReply`.
    ///
    /// `ReqInternalErr` and `ProtocolViolationErr` intentionally carry an
    /// opaque message: the framework never leaks internal error detail to
    /// the peer.
    #[must_use]
    pub fn wire_code_and_message(&self) -> (String, String) {
        match self {
            Self::ReqErr { code, message } => (code.as_str().to_string(), message.clone()),
            Self::ReqInternalErr => (Self::INTERNAL_SERVER_ERROR.to_string(), String::new()),
            Self::SessNotFoundErr => {
                (Self::SESSION_NOT_FOUND.to_string(), "no session for the given key".to_string())
            },
            Self::MaxSessConnsReachedErr => (
                Self::MAX_SESS_CONNS_REACHED.to_string(),
                "maximum concurrent connections for this session reached".to_string(),
            ),
            Self::ProtocolViolationErr(_) => (Self::PROTOCOL_VIOLATION.to_string(), String::new()),
            Self::TimeoutErr => ("request_timeout".to_string(), "request timed out".to_string()),
            Self::DisconnectedErr => {
                ("disconnected".to_string(), "connection closed".to_string())
            },
            Self::TransportErr(msg) => ("transport_error".to_string(), msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_internal_err_has_empty_message() {
        let (code, message) = WireError::ReqInternalErr.wire_code_and_message();
        assert_eq!(code, WireError::INTERNAL_SERVER_ERROR);
        assert!(message.is_empty());
    }

    #[test]
    fn req_err_round_trips_application_code() {
        let err = WireError::ReqErr {
            code: ErrorCode::new("bad_password"),
            message: "password incorrect".to_string(),
        };
        let (code, message) = err.wire_code_and_message();
        assert_eq!(code, "bad_password");
        assert_eq!(message, "password incorrect");
    }

    #[test]
    fn sess_not_found_maps_to_well_known_code() {
        let (code, _) = WireError::SessNotFoundErr.wire_code_and_message();
        assert_eq!(code, "session_not_found");
    }

    #[test]
    fn max_sess_conns_maps_to_well_known_code() {
        let (code, _) = WireError::MaxSessConnsReachedErr.wire_code_and_message();
        assert_eq!(code, "max_sess_conns_reached");
    }

    #[test]
    fn well_known_codes_round_trip_through_from_wire_code() {
        for err in [
            WireError::ReqInternalErr,
            WireError::SessNotFoundErr,
            WireError::MaxSessConnsReachedErr,
        ] {
            let (code, message) = err.wire_code_and_message();
            assert_eq!(WireError::from_wire_code(&code, message), err);
        }
    }

    #[test]
    fn unknown_code_becomes_application_req_err() {
        let err = WireError::from_wire_code("bad_password", "nope".to_string());
        assert_eq!(
            err,
            WireError::ReqErr { code: ErrorCode::new("bad_password"), message: "nope".to_string() }
        );
    }
}
