//! Session record and the generic session-info "varmap".
//!
//! A [`Session`] is server-side state bound to a key, optionally shared
//! across multiple connections belonging to the same user. `info` is an
//! application-provided container of named attributes, opaque to the
//! framework except that the framework can produce a string→generic-value
//! snapshot of it for persistence (see [`SessionValue`]).

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

/// A dynamically typed value used only for the session-info persistence
/// snapshot.
///
/// The framework never inspects these values; it only copies them between
/// the application-supplied `info` container and whatever the
/// [`crate::SessionManager`] persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionValue {
    /// Absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number (stored as `f64` to cover both integers and floats).
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An ordered list of values.
    List(Vec<SessionValue>),
    /// A nested map.
    Map(HashMap<String, SessionValue>),
}

impl From<&str> for SessionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for SessionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An application-provided container of named session attributes.
///
/// `Clone` gives value-copy semantics: [`SessionInfo::copy`] and later
/// mutation of either the original or the copy never affect the other,
/// since no field is shared through `Arc`/`Rc`. This mirrors the original
/// Go implementation's `Copy()` contract, exercised by
/// `genericSessionInfo_test.go`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    values: HashMap<String, SessionValue>,
}

impl SessionInfo {
    /// An empty info container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an info container from an existing map.
    #[must_use]
    pub fn from_map(values: HashMap<String, SessionValue>) -> Self {
        Self { values }
    }

    /// Set a field, overwriting any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<SessionValue>) {
        self.values.insert(field.into(), value.into());
    }

    /// Remove a field. Returns the removed value, if any.
    pub fn remove(&mut self, field: &str) -> Option<SessionValue> {
        self.values.remove(field)
    }

    /// Look up a field's value.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&SessionValue> {
        self.values.get(field)
    }

    /// The set of populated field names.
    #[must_use]
    pub fn fields(&self) -> std::collections::HashSet<String> {
        self.values.keys().cloned().collect()
    }

    /// A deep, independent copy. Equivalent to [`Clone::clone`]; provided
    /// under this name (`info.Copy()`) to match the framework's own
    /// vocabulary for this operation.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Snapshot as an owned `HashMap`, for handing to a
    /// [`crate::SessionManager`] implementation to persist.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, SessionValue> {
        self.values.clone()
    }

    /// Serialize to CBOR, for a [`crate::SessionManager`] that persists
    /// sessions to disk or a blob store rather than keeping them purely
    /// in-process.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in CBOR (this
    /// cannot happen for the [`SessionValue`] variants defined today).
    pub fn to_cbor(&self) -> Result<bytes::Bytes, ciborium::ser::Error<std::io::Error>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(bytes::Bytes::from(buf))
    }

    /// Deserialize a [`SessionInfo`] previously produced by
    /// [`SessionInfo::to_cbor`].
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not valid CBOR for this shape.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ciborium::de::Error<std::io::Error>> {
        ciborium::from_reader(bytes)
    }
}

/// Server-side state bound to a key.
///
/// `key`, `creation`, and the current `info` snapshot are exposed as
/// immutable reads; `last_lookup` and `info` are updated through
/// [`Session::touch`] / [`Session::set_info`], guarded by an internal
/// `RwLock` since a `Session` is shared (via `Arc`) across every connection
/// attached to it.
#[derive(Debug)]
pub struct Session {
    key: String,
    creation: Instant,
    last_lookup: RwLock<Instant>,
    info: RwLock<SessionInfo>,
}

impl Session {
    /// Create a new session record with the given key and info, stamping
    /// both `creation` and `last_lookup` to `now`.
    #[must_use]
    pub fn new(key: impl Into<String>, now: Instant, info: SessionInfo) -> Self {
        Self {
            key: key.into(),
            creation: now,
            last_lookup: RwLock::new(now),
            info: RwLock::new(info),
        }
    }

    /// Reconstruct a session restored from a [`SessionLookupResult`].
    #[must_use]
    pub fn from_lookup(key: impl Into<String>, result: SessionLookupResult) -> Self {
        Self {
            key: key.into(),
            creation: result.creation,
            last_lookup: RwLock::new(result.last_lookup),
            info: RwLock::new(result.info),
        }
    }

    /// The session key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// When the session was created.
    #[must_use]
    pub const fn creation(&self) -> Instant {
        self.creation
    }

    /// When the session was last looked up (e.g. via `RestoreSession`).
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn last_lookup(&self) -> Instant {
        *self.last_lookup.read().expect("session last_lookup lock poisoned")
    }

    /// Record a fresh lookup.
    #[allow(clippy::missing_panics_doc)]
    pub fn touch(&self, now: Instant) {
        *self.last_lookup.write().expect("session last_lookup lock poisoned") = now;
    }

    /// A snapshot copy of the session's info, safe to hand to the
    /// application without holding the internal lock.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn info(&self) -> SessionInfo {
        self.info.read().expect("session info lock poisoned").copy()
    }

    /// Replace the session's info container.
    #[allow(clippy::missing_panics_doc)]
    pub fn set_info(&self, info: SessionInfo) {
        *self.info.write().expect("session info lock poisoned") = info;
    }

    /// How long since the session was created.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.creation)
    }
}

/// Result of a successful [`crate::SessionManager::lookup`].
#[derive(Debug, Clone)]
pub struct SessionLookupResult {
    /// When the session was originally created.
    pub creation: Instant,
    /// When the session was last looked up before this call.
    pub last_lookup: Instant,
    /// The session's persisted info.
    pub info: SessionInfo,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generic_info_copy_is_immutable_against_later_mutation() {
        let mut info = SessionInfo::new();
        info.set("field1", "value1");
        info.set("field2", "value2");

        let copy = info.copy();

        info.remove("field1");
        info.set("field2", "overwritten");
        info.set("field3", "value3");

        assert_eq!(
            copy.fields(),
            ["field1".to_string(), "field2".to_string()].into_iter().collect()
        );
        assert_eq!(copy.value("field1"), Some(&SessionValue::String("value1".to_string())));
        assert_eq!(copy.value("field2"), Some(&SessionValue::String("value2".to_string())));
        assert_eq!(copy.value("field3"), None);
    }

    #[test]
    fn cbor_round_trips_mixed_value_types() {
        let mut info = SessionInfo::new();
        info.set("name", "ada");
        info.set("active", true);
        info.set("tags", SessionValue::List(vec!["a".into(), "b".into()]));
        info.set("meta", SessionValue::Null);

        let encoded = info.to_cbor().unwrap();
        let decoded = SessionInfo::from_cbor(&encoded).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn session_touch_updates_last_lookup_independently_of_creation() {
        let t0 = Instant::now();
        let session = Session::new("abc123", t0, SessionInfo::new());
        assert_eq!(session.last_lookup(), t0);

        let t1 = t0 + Duration::from_secs(1);
        session.touch(t1);
        assert_eq!(session.creation(), t0);
        assert_eq!(session.last_lookup(), t1);
    }
}
