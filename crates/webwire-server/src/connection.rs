//! The server-side half of a single peer's connection state.
//!
//! A [`Connection`] is the identity handlers and hooks observe: it is
//! constructed once per accepted transport and handed to the application as
//! the same `Arc` for the lifetime of the peer, so its identity is
//! observable via pointer comparison.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use webwire_core::{RequestRegistry, Session, SessionInfo, WireError};
use webwire_proto::{Message, MessageIdentifier, Payload};

/// Session-control operations a [`Connection`] delegates back to the
/// server that created it, since they need the server-wide session
/// registry and configuration that a bare `Connection` does not hold.
///
/// Type-erased behind `dyn` so `Connection` does not need to be generic
/// over [`crate::Application`].
#[async_trait]
pub(crate) trait SessionOps: Send + Sync + 'static {
    async fn create_session(
        &self,
        conn: &Arc<Connection>,
        correlation_id: MessageIdentifier,
        info: SessionInfo,
    ) -> Result<(), WireError>;

    async fn close_session(
        &self,
        conn: &Arc<Connection>,
        request_id: MessageIdentifier,
    ) -> Result<(), WireError>;
}

/// Monotonically increasing identifier, unique within a single server
/// process, handed out by [`crate::Server`] as each transport is accepted.
pub type ConnectionId = u64;

/// A single connected peer.
///
/// Outbound writes never touch the transport directly: they are pushed
/// onto `outbound_tx`, which feeds the connection's single writer task, so
/// writes to the transport are always serialized through it.
pub struct Connection {
    id: ConnectionId,
    outbound_tx: mpsc::UnboundedSender<bytes::Bytes>,
    session: RwLock<Option<Arc<Session>>>,
    request_registry: RequestRegistry,
    cancellation: CancellationToken,
    session_ops: Arc<dyn SessionOps>,
    handler_semaphore: Option<Arc<Semaphore>>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        outbound_tx: mpsc::UnboundedSender<bytes::Bytes>,
        session_ops: Arc<dyn SessionOps>,
        max_concurrent_handlers: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            outbound_tx,
            session: RwLock::new(None),
            request_registry: RequestRegistry::new(),
            cancellation: CancellationToken::new(),
            session_ops,
            handler_semaphore: (max_concurrent_handlers > 0)
                .then(|| Arc::new(Semaphore::new(max_concurrent_handlers))),
        })
    }

    /// Acquire a permit bounding this connection's concurrently in-flight
    /// handler tasks (`max_concurrent_handlers`). Returns `None`
    /// immediately when the cap is disabled (`0`).
    pub(crate) async fn acquire_handler_permit(&self) -> Option<OwnedSemaphorePermit> {
        match &self.handler_semaphore {
            Some(sem) => Arc::clone(sem).acquire_owned().await.ok(),
            None => None,
        }
    }

    /// The connection's process-local identifier. Distinct connections
    /// never share an id, even across reconnects.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether a session is currently attached.
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// The currently attached session, if any.
    pub async fn session(&self) -> Option<Arc<Session>> {
        self.session.read().await.clone()
    }

    pub(crate) async fn set_session(&self, session: Option<Arc<Session>>) {
        *self.session.write().await = session;
    }

    /// Cancellation token tied to this connection's lifetime. Cancelled
    /// once the inbound loop ends, which in turn cancels every in-flight
    /// handler invocation.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// This connection's outstanding server-initiated requests.
    pub(crate) fn request_registry(&self) -> &RequestRegistry {
        &self.request_registry
    }

    /// Push a `Signal` to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::DisconnectedErr`] if the connection's writer
    /// task has already exited.
    pub fn send_signal(&self, name: impl Into<String>, payload: Payload) -> Result<(), WireError> {
        self.send_message(&Message::new_signal(name, payload))
    }

    /// Send a request to the peer and await the reply through the
    /// connection's request registry. The caller is responsible for
    /// applying a deadline (e.g. via `tokio::time::timeout`) and releasing
    /// the id on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::DisconnectedErr`] if the connection's writer
    /// task has already exited.
    pub fn send_request(
        &self,
        id: MessageIdentifier,
        name: impl Into<String>,
        payload: Payload,
    ) -> Result<tokio::sync::oneshot::Receiver<Result<Payload, WireError>>, WireError> {
        let rx = self.request_registry.register(id);
        self.send_message(&Message::new_request(id, name, payload))?;
        Ok(rx)
    }

    pub(crate) fn send_message(&self, message: &Message) -> Result<(), WireError> {
        let bytes = message.encode()?;
        self.outbound_tx.send(bytes).map_err(|_| WireError::DisconnectedErr)
    }

    /// Attach a brand-new session to this connection. Allowed only from
    /// within a request handler invocation; fails if this connection
    /// already has a session attached or if the configured
    /// [`webwire_core::SessionManager`]'s persistence callback fails. On
    /// success, sends `SessionCreated` to the peer correlated with
    /// `correlation_id` (conventionally the triggering request's id).
    ///
    /// # Errors
    ///
    /// See [`WireError::ReqErr`] (session already attached) and
    /// [`WireError::ReqInternalErr`] (persistence failure).
    pub async fn create_session(
        self: &Arc<Self>,
        correlation_id: MessageIdentifier,
        info: SessionInfo,
    ) -> Result<(), WireError> {
        let ops = Arc::clone(&self.session_ops);
        ops.create_session(self, correlation_id, info).await
    }

    /// Destroy the currently attached session: removes it from the session
    /// registry, invokes the session manager's close callback, and
    /// notifies every attached connection (this one included) via
    /// `SessionClosed` before detaching them all.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::SessNotFoundErr`] if no session is attached.
    pub async fn close_session(self: &Arc<Self>, request_id: MessageIdentifier) -> Result<(), WireError> {
        let ops = Arc::clone(&self.session_ops);
        ops.close_session(self, request_id).await
    }
}

/// Context passed alongside every `on_signal`/`on_request` invocation.
///
/// Carries the inbound message's request id (absent for signals) and a
/// cancellation token scoped to this one handler invocation: it fires both
/// when the connection closes and, if a
/// [`crate::config::ServerConfig::handler_deadline`] is configured, when
/// that deadline elapses.
#[derive(Clone)]
pub struct HandlerContext {
    request_id: Option<MessageIdentifier>,
    cancellation: CancellationToken,
}

impl HandlerContext {
    pub(crate) const fn new(request_id: Option<MessageIdentifier>, cancellation: CancellationToken) -> Self {
        Self { request_id, cancellation }
    }

    /// The id of the request being handled, or `None` inside a signal
    /// handler.
    #[must_use]
    pub const fn request_id(&self) -> Option<MessageIdentifier> {
        self.request_id
    }

    /// Cancellation token for this specific handler invocation.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Shorthand for `self.cancellation().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
