//! Connection- and server-side primitives shared by `webwire-server` and
//! `webwire-client`: sessions, the session registry, the session manager
//! persistence adapter, the request registry, and the environment
//! abstraction used for deterministic testing.
//!
//! This crate owns no transport and no wire codec (see `webwire-proto`); it
//! is the glue layer that both ends of the connection use identically.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod env;
mod error;
mod request_registry;
mod session;
mod session_manager;
mod session_registry;

pub use env::{Environment, SystemEnv};
pub use error::WireError;
pub use request_registry::RequestRegistry;
pub use session::{Session, SessionInfo, SessionLookupResult, SessionValue};
pub use session_manager::{LookupError, LookupOutcome, SessionManager};
pub use session_registry::{Attachable, SessionRegistry};

/// Reserved request name a client sends to restore a previously created
/// session (payload is the session key, UTF-8 encoded). Shared between
/// `webwire-server` and `webwire-client` so both sides agree on the wire
/// name without depending on one another.
pub const RESTORE_SESSION: &str = "__restore_session__";

/// Reserved request name a client sends to destroy its attached session.
pub const CLOSE_SESSION: &str = "__close_session__";
