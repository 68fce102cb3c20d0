//! Client state machine, the dual of the server's `Connection`.
//!
//! A [`Client`] owns no transport of its own: [`Client::connect`] (behind
//! the `transport` feature) performs the WebSocket handshake and spawns the
//! reader/writer task pair, mirroring `webwire-server`'s per-connection
//! split of a single writer task draining an outbound queue and a reader
//! task decoding inbound frames.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use webwire_core::{RequestRegistry, WireError, CLOSE_SESSION, RESTORE_SESSION};
use webwire_proto::{Encoding, Message, MessageIdentifier, Payload, Tag};

use crate::ClientError;

/// Connection status of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// [`Client::disable`] was called; the client will never connect again.
    Disabled,
    /// Not connected. The initial state, and the state after [`Client::close`]
    /// or an unexpected disconnect.
    Disconnected,
    /// A [`Client::connect`] call is in progress.
    Connecting,
    /// Connected and dispatching inbound frames.
    Connected,
}

/// The client-local view of an attached session: just the key the server
/// handed back. Unlike the server's [`webwire_core::Session`], the client
/// never sees `info`, `creation`, or `lastLookup` — those are server-side
/// state the client only ever identifies by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    key: String,
}

impl ClientSession {
    /// The session key, as handed back by the server.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Reconnection behavior after an unexpected disconnect. Never applies to
/// [`Client::close`], which is a deliberate, final disconnect.
#[derive(Debug, Clone)]
pub enum ReconnectPolicy {
    /// Never reconnect automatically; the caller must call
    /// [`Client::connect`] again.
    Disabled,
    /// Retry at a fixed interval, up to `max_attempts` times (`None` for
    /// unlimited).
    Fixed {
        /// Delay between reconnection attempts.
        delay: Duration,
        /// Maximum number of attempts, or `None` for unlimited.
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Tunables for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline applied to [`Client::request`] when no per-call override is
    /// given.
    pub default_request_timeout: Duration,
    /// Deadline for the transport handshake in [`Client::connect`].
    pub handshake_timeout: Duration,
    /// What to do after an unexpected disconnect.
    pub reconnect: ReconnectPolicy,
    /// Maximum accepted inbound frame size, in bytes.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::Disabled,
            max_frame_size: 1 << 20,
        }
    }
}

impl ClientConfig {
    /// Default configuration: 10s request timeout, 5s handshake timeout, no
    /// automatic reconnection, 1 MiB max frame size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default request timeout.
    #[must_use]
    pub fn with_default_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = timeout;
        self
    }

    /// Override the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Override the maximum accepted inbound frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }
}

/// Optional callbacks the embedding application registers to observe
/// connection-lifecycle events. Every field defaults to `None`; unset
/// hooks are simply never called.
#[derive(Default)]
pub struct ClientHooks {
    on_session_created: Option<Box<dyn Fn(ClientSession) + Send + Sync>>,
    on_session_closed: Option<Box<dyn Fn() + Send + Sync>>,
    on_disconnected: Option<Box<dyn Fn() + Send + Sync>>,
    on_signal: Option<Box<dyn Fn(Payload) + Send + Sync>>,
}

impl ClientHooks {
    /// No hooks registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once a session is attached, whether freshly created via a
    /// `login`-style request or restored via [`Client::restore_session`].
    #[must_use]
    pub fn with_on_session_created(
        mut self,
        f: impl Fn(ClientSession) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_created = Some(Box::new(f));
        self
    }

    /// Called when the attached session is destroyed, whether by
    /// [`Client::close_session`] or by a server-initiated `SessionClosed`
    /// push.
    #[must_use]
    pub fn with_on_session_closed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_closed = Some(Box::new(f));
        self
    }

    /// Called after the connection is lost, whether via [`Client::close`]
    /// or an unexpected transport failure.
    #[must_use]
    pub fn with_on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Box::new(f));
        self
    }

    /// Called for every inbound `Signal`.
    #[must_use]
    pub fn with_on_signal(mut self, f: impl Fn(Payload) + Send + Sync + 'static) -> Self {
        self.on_signal = Some(Box::new(f));
        self
    }
}

struct State {
    status: Status,
    session: Option<ClientSession>,
    outbound_tx: Option<mpsc::UnboundedSender<Bytes>>,
}

/// Client-side half of the webwire protocol.
///
/// Construct with [`Client::new`], then [`Client::connect`] (requires the
/// `transport` feature) to attach it to a server.
pub struct Client {
    pub(crate) config: ClientConfig,
    hooks: ClientHooks,
    state: RwLock<State>,
    request_registry: RequestRegistry,
    /// Request ids for which a payload-less `SessionCreated` special reply
    /// has arrived but the correlated ordinary `Reply` (carrying the new
    /// key as its payload, per the originating request handler's own
    /// return value) has not yet. See `DESIGN.md` for why the key travels
    /// this way rather than on the special reply itself.
    pending_session_creation: StdMutex<HashSet<MessageIdentifier>>,
    connection_cancel: RwLock<Option<CancellationToken>>,
}

impl Client {
    /// Construct a disconnected client. Call [`Client::connect`] to attach
    /// it to a server.
    #[must_use]
    pub fn new(config: ClientConfig, hooks: ClientHooks) -> Arc<Self> {
        Arc::new(Self {
            config,
            hooks,
            state: RwLock::new(State { status: Status::Disconnected, session: None, outbound_tx: None }),
            request_registry: RequestRegistry::new(),
            pending_session_creation: StdMutex::new(HashSet::new()),
            connection_cancel: RwLock::new(None),
        })
    }

    /// Current connection status.
    pub async fn status(&self) -> Status {
        self.state.read().await.status
    }

    /// The currently attached session, if any. Survives [`Client::close`],
    /// which retains the local session object.
    pub async fn session(&self) -> Option<ClientSession> {
        self.state.read().await.session.clone()
    }

    /// Permanently disable the client: closes the connection, if any, and
    /// moves to [`Status::Disabled`]. A disabled client refuses every
    /// future [`Client::connect`] call.
    pub async fn disable(&self) {
        if let Some(cancel) = self.connection_cancel.write().await.take() {
            cancel.cancel();
        }
        self.state.write().await.status = Status::Disabled;
    }

    /// Disconnect from the server, if connected. The local session object
    /// is retained; reconnecting does not automatically restore it on the
    /// wire — call [`Client::restore_session`] explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if not currently connected.
    pub async fn close(&self) -> Result<(), ClientError> {
        let cancel = self.connection_cancel.read().await.clone();
        match cancel {
            Some(cancel) => {
                cancel.cancel();
                Ok(())
            },
            None => Err(ClientError::NotConnected),
        }
    }

    /// Send a one-way signal. No reply is expected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if not currently connected.
    pub async fn signal(&self, name: impl Into<String>, payload: Payload) -> Result<(), ClientError> {
        self.send_message(&Message::new_signal(name, payload)).await
    }

    /// Send a request and await its reply, applying
    /// [`ClientConfig::default_request_timeout`].
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] if not currently connected;
    /// [`ClientError::Wire`]`(`[`WireError::TimeoutErr`]`)` if the deadline
    /// elapses; `Wire(WireError::ReqErr { .. })` or `Wire(ReqInternalErr)`
    /// for an application-level failure.
    pub async fn request(
        &self,
        name: impl Into<String>,
        payload: Payload,
    ) -> Result<Payload, ClientError> {
        self.request_with_timeout(self.config.default_request_timeout, name, payload).await
    }

    /// Like [`Client::request`], with an explicit deadline instead of
    /// [`ClientConfig::default_request_timeout`].
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn request_with_timeout(
        &self,
        timeout: Duration,
        name: impl Into<String>,
        payload: Payload,
    ) -> Result<Payload, ClientError> {
        let (id, rx) = self.register_fresh_request();
        self.send_message(&Message::new_request(id, name, payload)).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome.map_err(ClientError::from),
            Ok(Err(_)) => Err(ClientError::Wire(WireError::DisconnectedErr)),
            Err(_) => {
                self.request_registry.release(id);
                Err(ClientError::Wire(WireError::TimeoutErr))
            },
        }
    }

    /// Attach to a previously created session by presenting its key.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] if not currently connected;
    /// `Wire(SessNotFoundErr)` if the server has no record of `key`;
    /// `Wire(MaxSessConnsReachedErr)` if the session's connection cap is
    /// already reached.
    pub async fn restore_session(&self, key: &str) -> Result<(), ClientError> {
        let (id, rx) = self.register_fresh_request();
        self.send_message(&Message::new_request(
            id,
            RESTORE_SESSION,
            Payload::new(Encoding::Utf8, key.as_bytes().to_vec()),
        ))
        .await?;

        match tokio::time::timeout(self.config.default_request_timeout, rx).await {
            Ok(Ok(Ok(_))) => {
                self.state.write().await.session = Some(ClientSession { key: key.to_string() });
                Ok(())
            },
            Ok(Ok(Err(err))) => Err(ClientError::from(err)),
            Ok(Err(_)) => Err(ClientError::Wire(WireError::DisconnectedErr)),
            Err(_) => {
                self.request_registry.release(id);
                Err(ClientError::Wire(WireError::TimeoutErr))
            },
        }
    }

    /// Destroy the attached session. Works offline: if the client is
    /// currently disconnected, the local session is dropped
    /// immediately with no network round-trip. If connected, a
    /// `CloseSession` request is sent and awaited; [`ClientHooks::with_on_session_closed`]
    /// fires once the server's `SessionClosed` push for this session
    /// arrives (which may be before or after this call returns, since the
    /// push targets every attached connection, not just the caller).
    ///
    /// # Errors
    ///
    /// `Wire(SessNotFoundErr)` if the server reports no session is attached
    /// (e.g. the session was already destroyed from elsewhere).
    pub async fn close_session(&self) -> Result<(), ClientError> {
        let outbound_tx = self.state.read().await.outbound_tx.clone();
        let Some(_outbound_tx) = outbound_tx else {
            self.state.write().await.session = None;
            return Ok(());
        };

        let (id, rx) = self.register_fresh_request();
        self.send_message(&Message::new_request(id, CLOSE_SESSION, Payload::new(Encoding::Binary, Vec::new())))
            .await?;

        match tokio::time::timeout(self.config.default_request_timeout, rx).await {
            Ok(Ok(Ok(_))) => Ok(()),
            Ok(Ok(Err(err))) => Err(ClientError::from(err)),
            Ok(Err(_)) => Err(ClientError::Wire(WireError::DisconnectedErr)),
            Err(_) => {
                self.request_registry.release(id);
                Err(ClientError::Wire(WireError::TimeoutErr))
            },
        }
    }

    fn fresh_request_id(&self) -> MessageIdentifier {
        use webwire_core::{Environment, SystemEnv};
        MessageIdentifier::from_bytes(SystemEnv::new().random_bytes_8())
    }

    /// Draw a request id and register it in one step, retrying on the
    /// astronomically rare collision with an id already outstanding rather
    /// than risk [`RequestRegistry::register`]'s panic.
    fn register_fresh_request(&self) -> (MessageIdentifier, oneshot::Receiver<Result<Payload, WireError>>) {
        loop {
            let id = self.fresh_request_id();
            if let Some(rx) = self.request_registry.try_register(id) {
                return (id, rx);
            }
        }
    }

    pub(crate) async fn send_message(&self, message: &Message) -> Result<(), ClientError> {
        let bytes = message.encode().map_err(|e| ClientError::Wire(WireError::from(e)))?;
        let outbound_tx = self.state.read().await.outbound_tx.clone();
        match outbound_tx {
            Some(tx) => tx.send(bytes).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Reserve [`Status::Connecting`]. Called by [`Client::connect`]
    /// (`transport` feature) before the handshake starts; exposed
    /// `pub(crate)` so the transport module does not need to reach into
    /// private `State` fields directly.
    pub(crate) async fn begin_connecting(&self) -> Result<(), ClientError> {
        let mut state = self.state.write().await;
        match state.status {
            Status::Connected | Status::Connecting => Err(ClientError::AlreadyConnected),
            Status::Disabled => Err(ClientError::Disabled),
            Status::Disconnected => {
                state.status = Status::Connecting;
                Ok(())
            },
        }
    }

    /// Install a freshly handshaken transport's outbound half and move to
    /// [`Status::Connected`], returning the cancellation token the reader
    /// loop should select on.
    pub(crate) async fn finish_connecting(
        self: &Arc<Self>,
        outbound_tx: mpsc::UnboundedSender<Bytes>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        *self.connection_cancel.write().await = Some(cancel.clone());
        let mut state = self.state.write().await;
        state.status = Status::Connected;
        state.outbound_tx = Some(outbound_tx);
        cancel
    }

    /// Roll back a [`Self::begin_connecting`] reservation after a failed
    /// handshake.
    pub(crate) async fn abort_connecting(&self) {
        self.state.write().await.status = Status::Disconnected;
    }

    /// Route one decoded inbound message: signals to
    /// [`ClientHooks::with_on_signal`], replies/errors to the request
    /// registry (with the `SessionCreated` bookkeeping described on
    /// [`Self::pending_session_creation`]), and special replies to
    /// session-lifecycle handling.
    pub(crate) async fn dispatch_inbound(&self, message: Message) {
        match message {
            Message::Signal { payload, .. } => {
                if let Some(hook) = &self.hooks.on_signal {
                    hook(payload);
                }
            },

            Message::Request { id, .. } => {
                // Clients expose no application-level request handler;
                // answer with an opaque internal error rather than leaving
                // the peer's request registry waiting out its deadline.
                let _ = self
                    .send_message(&Message::new_error_reply(
                        id,
                        WireError::INTERNAL_SERVER_ERROR,
                        "this client does not handle server-initiated requests",
                    ))
                    .await;
            },

            Message::Reply { id, payload } => {
                let was_session_creation = {
                    let mut pending =
                        self.pending_session_creation.lock().expect("client lock poisoned");
                    pending.remove(&id)
                };
                if was_session_creation {
                    self.complete_session_created(payload.data()).await;
                }
                self.request_registry.resolve_reply(id, payload);
            },

            Message::ErrorReply { id, code, message } => {
                self.pending_session_creation.lock().expect("client lock poisoned").remove(&id);
                self.request_registry.resolve_error(id, code.as_str().to_string(), message);
            },

            Message::SpecialRequestReply { tag, id } => self.dispatch_special(tag, id).await,
        }
    }

    async fn dispatch_special(&self, tag: Tag, id: MessageIdentifier) {
        match tag {
            Tag::SessionCreated => {
                self.pending_session_creation.lock().expect("client lock poisoned").insert(id);
            },
            Tag::SessionClosed => {
                let had_session = self.state.write().await.session.take().is_some();
                if had_session {
                    if let Some(hook) = &self.hooks.on_session_closed {
                        hook();
                    }
                }
            },
            Tag::RestoreSession | Tag::CloseSession => {
                self.request_registry.resolve_reply(id, Payload::new(Encoding::Binary, Vec::new()));
            },
            // The client never legitimately receives any other tag as a
            // special reply; ignored rather than treated as fatal, mirroring
            // the server's own tolerance for peer protocol deviations that
            // aren't parse failures (`webwire_server`'s dispatch does the
            // same for an inbound `SpecialRequestReply`).
            Tag::SignalBinary
            | Tag::SignalUtf8
            | Tag::SignalUtf16
            | Tag::RequestBinary
            | Tag::RequestUtf8
            | Tag::RequestUtf16
            | Tag::ReplyBinary
            | Tag::ReplyUtf8
            | Tag::ReplyUtf16
            | Tag::ErrorReply => {},
        }
    }

    async fn complete_session_created(&self, key_bytes: &[u8]) {
        let Ok(key) = std::str::from_utf8(key_bytes) else { return };
        let session = ClientSession { key: key.to_string() };
        self.state.write().await.session = Some(session.clone());
        if let Some(hook) = &self.hooks.on_session_created {
            hook(session);
        }
    }

    /// Called by the reader task once its loop ends, for any reason
    /// (explicit [`Client::close`], transport EOF, decode failure, oversized
    /// frame). Resolves every outstanding request as disconnected, fires
    /// [`ClientHooks::with_on_disconnected`], and moves to
    /// [`Status::Disconnected`] — unless [`Client::disable`] already moved
    /// the client to [`Status::Disabled`], which takes precedence.
    pub(crate) async fn handle_disconnect(&self) {
        {
            let mut state = self.state.write().await;
            if state.status != Status::Disabled {
                state.status = Status::Disconnected;
            }
            state.outbound_tx = None;
        }
        self.connection_cancel.write().await.take();
        self.request_registry.disconnect_all();
        self.pending_session_creation.lock().expect("client lock poisoned").clear();
        if let Some(hook) = &self.hooks.on_disconnected {
            hook();
        }
    }
}

#[cfg(feature = "transport")]
impl Client {
    /// Connect to a webwire server at `url` (e.g. `"ws://127.0.0.1:9443"`).
    ///
    /// Performs the WebSocket handshake under
    /// [`ClientConfig::handshake_timeout`], then spawns a writer task
    /// draining an outbound queue and a reader task decoding inbound
    /// frames, mirroring `webwire-server`'s per-connection reader/writer
    /// task split.
    ///
    /// # Errors
    ///
    /// [`ClientError::AlreadyConnected`] if already connected or
    /// connecting; [`ClientError::Disabled`] if [`Client::disable`] was
    /// called; [`ClientError::Transport`] if the handshake fails or times
    /// out.
    pub async fn connect(self: &Arc<Self>, url: &str) -> Result<(), ClientError> {
        self.begin_connecting().await?;

        let handshake = crate::transport::WsConnection::connect(url);
        let ws = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                self.abort_connecting().await;
                return Err(e);
            },
            Err(_) => {
                self.abort_connecting().await;
                return Err(ClientError::Transport("handshake timed out".to_string()));
            },
        };

        let (mut sender, mut receiver) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let cancel = self.finish_connecting(outbound_tx).await;

        let writer_cancel = cancel.clone();
        let writer = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    biased;
                    () = writer_cancel.cancelled() => break,
                    frame = outbound_rx.recv() => frame,
                };
                match frame {
                    Some(frame) => {
                        if let Err(e) = sender.send(frame).await {
                            tracing::debug!(error = %e, "outbound write failed, closing writer");
                            break;
                        }
                    },
                    None => break,
                }
            }
            // Drain whatever was already queued before closing.
            while let Ok(frame) = outbound_rx.try_recv() {
                let _ = sender.send(frame).await;
            }
            let _ = sender.close().await;
        });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    frame = receiver.recv() => frame,
                };

                let bytes = match frame {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "read failed, closing connection");
                        break;
                    },
                };

                if bytes.len() > this.config.max_frame_size {
                    tracing::warn!(len = bytes.len(), "frame exceeds max_frame_size, closing connection");
                    break;
                }

                let message = match Message::decode(&bytes) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(error = %e, "protocol violation, closing connection");
                        break;
                    },
                };

                this.dispatch_inbound(message).await;
            }

            // Ensure the writer task unblocks regardless of why the reader
            // loop ended (explicit close already cancelled this token, but
            // an EOF or a read error otherwise wouldn't).
            cancel.cancel();
            let _ = writer.await;
            this.handle_disconnect().await;
        });

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use webwire_proto::ErrorCode;

    use super::*;

    fn id(byte: u8) -> MessageIdentifier {
        MessageIdentifier::from_bytes([byte; 8])
    }

    async fn connected_client(hooks: ClientHooks) -> (Arc<Client>, mpsc::UnboundedReceiver<Bytes>) {
        let client = Client::new(ClientConfig::new(), hooks);
        client.begin_connecting().await.expect("fresh client connects");
        let (tx, rx) = mpsc::unbounded_channel();
        client.finish_connecting(tx).await;
        (client, rx)
    }

    #[tokio::test]
    async fn new_client_starts_disconnected_with_no_session() {
        let client = Client::new(ClientConfig::new(), ClientHooks::new());
        assert_eq!(client.status().await, Status::Disconnected);
        assert_eq!(client.session().await, None);
    }

    #[tokio::test]
    async fn request_without_connection_fails_fast() {
        let client = Client::new(ClientConfig::new(), ClientHooks::new());
        let err = client.request("ping", Payload::new(Encoding::Binary, Vec::new())).await;
        assert!(matches!(err, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn signal_is_forwarded_unmodified_on_the_outbound_queue() {
        let (client, mut rx) = connected_client(ClientHooks::new()).await;
        client.signal("ping", Payload::new(Encoding::Utf8, b"hi".to_vec())).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(
            decoded,
            Message::Signal {
                name: webwire_proto::MessageName::new("ping"),
                payload: Payload::new(Encoding::Utf8, b"hi".to_vec()),
            }
        );
    }

    #[tokio::test]
    async fn session_created_reply_sets_local_session_and_fires_hook() {
        let created = Arc::new(AtomicBool::new(false));
        let created_flag = Arc::clone(&created);
        let hooks = ClientHooks::new().with_on_session_created(move |_session| {
            created_flag.store(true, Ordering::SeqCst);
        });
        let (client, _rx) = connected_client(hooks).await;

        // Register a fake outstanding "login" request the way `request()`
        // would, then feed in the two-frame dance a real server produces:
        // a payload-less SessionCreated special reply, followed by the
        // ordinary Reply carrying the key as its payload.
        let request_id = id(7);
        let login_rx = client.request_registry.register(request_id);

        client.dispatch_inbound(Message::SpecialRequestReply { tag: Tag::SessionCreated, id: request_id }).await;
        assert_eq!(client.session().await, None, "key not known until the ordinary reply arrives");

        client
            .dispatch_inbound(Message::Reply {
                id: request_id,
                payload: Payload::new(Encoding::Utf8, b"session-key-123".to_vec()),
            })
            .await;

        let session = client.session().await.expect("session created");
        assert_eq!(session.key(), "session-key-123");
        assert!(created.load(Ordering::SeqCst));

        let login_reply = login_rx.await.unwrap().unwrap();
        assert_eq!(login_reply.data(), b"session-key-123");
    }

    #[tokio::test]
    async fn session_closed_push_clears_session_and_fires_hook_once() {
        let closed_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed_count);
        let hooks = ClientHooks::new().with_on_session_closed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (client, _rx) = connected_client(hooks).await;
        client.state.write().await.session = Some(ClientSession { key: "abc".to_string() });

        client.dispatch_inbound(Message::SpecialRequestReply { tag: Tag::SessionClosed, id: id(1) }).await;

        assert_eq!(client.session().await, None);
        assert_eq!(closed_count.load(Ordering::SeqCst), 1);

        // A redundant push (e.g. a second sibling notification) must not
        // re-fire the hook once the session is already gone.
        client.dispatch_inbound(Message::SpecialRequestReply { tag: Tag::SessionClosed, id: id(2) }).await;
        assert_eq!(closed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_reply_resolves_request_with_application_error() {
        let (client, _rx) = connected_client(ClientHooks::new()).await;
        let request_id = id(9);
        let rx = client.request_registry.register(request_id);

        client
            .dispatch_inbound(Message::ErrorReply {
                id: request_id,
                code: ErrorCode::new("bad_password"),
                message: "nope".to_string(),
            })
            .await;

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err, WireError::ReqErr { code: ErrorCode::new("bad_password"), message: "nope".to_string() });
    }

    #[tokio::test]
    async fn inbound_request_gets_an_opaque_internal_error_reply() {
        let (client, mut rx) = connected_client(ClientHooks::new()).await;
        client
            .dispatch_inbound(Message::Request {
                id: id(3),
                name: webwire_proto::MessageName::new("push"),
                payload: Payload::new(Encoding::Binary, Vec::new()),
            })
            .await;

        let frame = rx.recv().await.unwrap();
        match Message::decode(&frame).unwrap() {
            Message::ErrorReply { id: reply_id, code, .. } => {
                assert_eq!(reply_id, id(3));
                assert_eq!(code.as_str(), WireError::INTERNAL_SERVER_ERROR);
            },
            other => panic!("expected an ErrorReply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle_disconnect_resolves_outstanding_requests_and_fires_hook() {
        let disconnected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disconnected);
        let hooks = ClientHooks::new().with_on_disconnected(move || {
            flag.store(true, Ordering::SeqCst);
        });
        let (client, _rx) = connected_client(hooks).await;
        let rx = client.request_registry.register(id(4));

        client.handle_disconnect().await;

        assert_eq!(client.status().await, Status::Disconnected);
        assert!(disconnected.load(Ordering::SeqCst));
        assert_eq!(rx.await.unwrap().unwrap_err(), WireError::DisconnectedErr);
    }

    #[tokio::test]
    async fn disable_then_disconnect_stays_disabled() {
        let (client, _rx) = connected_client(ClientHooks::new()).await;
        client.disable().await;
        assert_eq!(client.status().await, Status::Disabled);

        // A reader task's terminal `handle_disconnect` call must not
        // downgrade a disabled client back to plain `Disconnected`.
        client.handle_disconnect().await;
        assert_eq!(client.status().await, Status::Disabled);
    }

    #[tokio::test]
    async fn close_session_offline_clears_local_session_without_sending_anything() {
        let client = Client::new(ClientConfig::new(), ClientHooks::new());
        client.state.write().await.session = Some(ClientSession { key: "abc".to_string() });

        client.close_session().await.unwrap();

        assert_eq!(client.session().await, None);
    }

    #[tokio::test]
    async fn begin_connecting_twice_fails_with_already_connected() {
        let client = Client::new(ClientConfig::new(), ClientHooks::new());
        client.begin_connecting().await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        client.finish_connecting(tx).await;

        let err = client.begin_connecting().await;
        assert!(matches!(err, Err(ClientError::AlreadyConnected)));
    }
}
