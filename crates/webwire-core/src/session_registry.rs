//! Registry mapping a session key to the connections currently attached to
//! it.
//!
//! A session can be shared by several connections (e.g. the same user
//! logged in from two tabs). The registry enforces
//! `maxConnectionsPerSession` and hands back the set of sibling connections
//! so the caller can fan a signal out to all of them.
//!
//! Connections hold a strong [`std::sync::Arc<Session>`]; the registry only
//! ever stores [`std::sync::Weak`] references to connections so the graph
//! (`Connection` → `Session` → `Registry` → `Connection`) has no reference
//! cycle.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use tokio::sync::RwLock;

use crate::{session::Session, WireError};

/// Something that can be registered against a session: a connection
/// identity, compared by pointer equality through [`Weak::ptr_eq`].
pub trait Attachable: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Attachable for T {}

struct Entry<C> {
    session: Arc<Session>,
    connections: Vec<Weak<C>>,
}

/// Tracks which connections are attached to which session keys.
///
/// `C` is the connection type the server binds this registry to; the
/// registry itself only needs to hold weak references to it, so it does not
/// need to know anything about `C` beyond `Send + Sync`.
pub struct SessionRegistry<C: Attachable> {
    max_connections_per_session: usize,
    entries: RwLock<HashMap<String, Entry<C>>>,
}

impl<C: Attachable> SessionRegistry<C> {
    /// Create a registry enforcing `max_connections_per_session` concurrent
    /// connections per session key. `0` means unlimited.
    #[must_use]
    pub fn new(max_connections_per_session: usize) -> Self {
        Self { max_connections_per_session, entries: RwLock::new(HashMap::new()) }
    }

    /// Attach `connection` to `session`, creating the entry if this is the
    /// first connection for that key.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MaxSessConnsReachedErr`] if the session already
    /// has `max_connections_per_session` live connections attached.
    pub async fn attach(
        &self,
        session: Arc<Session>,
        connection: &Arc<C>,
    ) -> Result<(), WireError> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(session.key().to_string()).or_insert_with(|| Entry {
            session: Arc::clone(&session),
            connections: Vec::new(),
        });

        entry.connections.retain(|weak| weak.strong_count() > 0);

        if self.max_connections_per_session > 0
            && entry.connections.len() >= self.max_connections_per_session
        {
            if entry.connections.is_empty() {
                entries.remove(session.key());
            }
            return Err(WireError::MaxSessConnsReachedErr);
        }

        entry.connections.push(Arc::downgrade(connection));
        Ok(())
    }

    /// Detach `connection` from `session_key`. Destroys the entry once its
    /// last live connection is gone.
    pub async fn detach(&self, session_key: &str, connection: &Arc<C>) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(session_key) else { return };

        entry.connections.retain(|weak| {
            weak.strong_count() > 0 && !Weak::ptr_eq(weak, &Arc::downgrade(connection))
        });

        if entry.connections.is_empty() {
            entries.remove(session_key);
        }
    }

    /// Remove a session entirely, regardless of how many connections are
    /// attached (used by client-initiated `CloseSession`).
    pub async fn destroy(&self, session_key: &str) -> Option<Arc<Session>> {
        self.entries.write().await.remove(session_key).map(|entry| entry.session)
    }

    /// The session currently registered under `session_key`, if any.
    pub async fn lookup(&self, session_key: &str) -> Option<Arc<Session>> {
        self.entries.read().await.get(session_key).map(|entry| Arc::clone(&entry.session))
    }

    /// All live connections currently attached to `session_key`, in
    /// attachment order. Dead weak references are silently skipped.
    pub async fn enumerate(&self, session_key: &str) -> Vec<Arc<C>> {
        let entries = self.entries.read().await;
        entries
            .get(session_key)
            .map(|entry| entry.connections.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Number of sessions currently tracked.
    pub async fn session_count(&self) -> usize {
        self.entries.read().await.len()
    }
}
