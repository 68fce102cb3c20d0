//! Outward adapter an embedding application implements to persist sessions
//! across restarts.
//!
//! When no [`SessionManager`] is configured, sessions live purely in the
//! in-memory [`crate::SessionRegistry`] and vanish on restart — the
//! framework never requires one.

#![cfg_attr(
    test,
    allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")
)]

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{session::SessionLookupResult, WireError};

/// Outcome of [`SessionManager::lookup`].
pub type LookupOutcome = Result<SessionLookupResult, LookupError>;

/// Why a [`SessionManager::lookup`] failed to produce a session.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// No session exists under the given key. Distinct from a storage
    /// failure so the framework can report it as `session_not_found`
    /// rather than an internal error.
    NotFound,
    /// The lookup failed for some other reason (storage unavailable,
    /// deserialization failure, ...).
    Err(String),
}

impl From<LookupError> for WireError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound => Self::SessNotFoundErr,
            LookupError::Err(_) => Self::ReqInternalErr,
        }
    }
}

/// Persistence hook for sessions, implemented by the embedding application.
///
/// All three methods are invoked synchronously with respect to the
/// operation that triggered them: `session_created` before the
/// `SessionCreated` wire message is sent (a failure aborts creation);
/// `session_closed` when a session is destroyed, before sibling
/// connections are notified.
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    /// Persist a newly created session. A returned error aborts session
    /// creation; the client never receives `SessionCreated`.
    async fn session_created(
        &self,
        key: &str,
        info: &HashMap<String, crate::session::SessionValue>,
    ) -> Result<(), String>;

    /// Look up a previously persisted session by key.
    async fn session_lookup(&self, key: &str) -> LookupOutcome;

    /// Invoked when a session is destroyed, regardless of whether it was
    /// client- or server-initiated.
    async fn session_closed(&self, key: &str) -> Result<(), String>;
}
