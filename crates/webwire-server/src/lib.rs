//! `webwire` protocol server.
//!
//! Accepts WebSocket connections, decodes wire messages (`webwire-proto`),
//! and dispatches them to an embedding [`Application`]. Session lifecycle
//! (`CreateSession`/`RestoreSession`/`CloseSession`) and request/reply
//! correlation are handled by the framework; everything else — what a
//! named request or signal actually does — is the application's.
//!
//! # Architecture
//!
//! - [`Connection`]: per-peer identity, outbound queue, attached session.
//! - [`Application`]: the embedding app's request/signal handlers and
//!   connect/disconnect hooks.
//! - [`Server`]: accepts transports, spawns a reader/writer task pair per
//!   connection, and owns the server-wide session registry.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod connection;
mod error;
mod transport;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
pub use config::ServerConfig;
use connection::SessionOps;
pub use connection::{Connection, ConnectionId, HandlerContext};
pub use error::ServerError;
use tokio::sync::{mpsc, RwLock};
pub use transport::{WsConnection, WsListener, WsReceiver, WsSender};
pub use webwire_core::{CLOSE_SESSION, RESTORE_SESSION};
use webwire_core::{Environment, Session, SessionInfo, SessionRegistry, SystemEnv, WireError};
use webwire_proto::{ErrorCode, Message, MessageIdentifier, Payload};

/// Extension point the embedding application implements.
///
/// Every method runs inside its own spawned task; a panic inside one is
/// isolated to that task and does not bring down the connection.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Handle a named request, returning the reply payload or a
    /// [`WireError`]. [`WireError::ReqErr`] is serialized verbatim to the
    /// peer; any other error becomes an opaque internal-error reply.
    async fn on_request(
        &self,
        ctx: &HandlerContext,
        conn: &Arc<Connection>,
        name: &str,
        payload: Payload,
    ) -> Result<Payload, WireError>;

    /// Handle a named signal. No reply is expected or permitted.
    async fn on_signal(
        &self,
        ctx: &HandlerContext,
        conn: &Arc<Connection>,
        name: &str,
        payload: Payload,
    ) {
        let _ = (ctx, conn, name, payload);
    }

    /// Called once, after the transport handshake completes and before
    /// any inbound dispatch begins.
    async fn on_client_connected(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }

    /// Called exactly once per successful connect, after the inbound loop
    /// ends and all in-flight handlers have resolved or been cancelled.
    /// `conn` is the same identity passed to `on_client_connected`.
    async fn on_client_disconnected(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }
}

struct Shared<A> {
    config: ServerConfig,
    app: Arc<A>,
    session_registry: SessionRegistry<Connection>,
    env: SystemEnv,
}

#[async_trait]
impl<A: Application> SessionOps for Shared<A> {
    async fn create_session(
        &self,
        conn: &Arc<Connection>,
        correlation_id: MessageIdentifier,
        info: SessionInfo,
    ) -> Result<(), WireError> {
        if conn.has_session().await {
            return Err(already_has_session_error());
        }

        let key = MessageIdentifier::from_bytes(self.env.random_bytes_8()).to_string();

        if let Some(manager) = &self.config.session_manager {
            manager
                .session_created(&key, &info.to_map())
                .await
                .map_err(|_| WireError::ReqInternalErr)?;
        }

        let session = Arc::new(Session::new(key, self.env.now(), info));
        self.session_registry.attach(Arc::clone(&session), conn).await?;
        conn.set_session(Some(session)).await;
        conn.send_message(&Message::new_special_reply(
            webwire_proto::Tag::SessionCreated,
            correlation_id,
        ))?;
        Ok(())
    }

    async fn close_session(
        &self,
        conn: &Arc<Connection>,
        request_id: MessageIdentifier,
    ) -> Result<(), WireError> {
        let Some(session) = conn.session().await else { return Err(WireError::SessNotFoundErr) };
        let key = session.key().to_string();

        let siblings = self.session_registry.enumerate(&key).await;
        self.session_registry.destroy(&key).await;

        if let Some(manager) = &self.config.session_manager {
            manager.session_closed(&key).await.map_err(|_| WireError::ReqInternalErr)?;
        }

        let push_id = MessageIdentifier::from_bytes(self.env.random_bytes_8());
        for sibling in &siblings {
            sibling.set_session(None).await;
            let _unreachable_peer_is_not_fatal_here =
                sibling.send_message(&Message::new_special_reply(
                    webwire_proto::Tag::SessionClosed,
                    push_id,
                ));
        }

        conn.send_message(&Message::new_special_reply(webwire_proto::Tag::CloseSession, request_id))?;
        Ok(())
    }
}

impl<A: Application> Shared<A> {
    async fn restore_session(
        &self,
        conn: &Arc<Connection>,
        request_id: MessageIdentifier,
        key: &str,
    ) -> Result<(), WireError> {
        if conn.has_session().await {
            return Err(already_has_session_error());
        }

        let manager = self.config.session_manager.as_ref().ok_or(WireError::SessNotFoundErr)?;
        let result = manager.session_lookup(key).await.map_err(WireError::from)?;

        let session = Arc::new(Session::from_lookup(key, result));
        session.touch(self.env.now());

        self.session_registry.attach(Arc::clone(&session), conn).await?;
        conn.set_session(Some(session)).await;
        conn.send_message(&Message::new_special_reply(
            webwire_proto::Tag::RestoreSession,
            request_id,
        ))?;
        Ok(())
    }

}

fn already_has_session_error() -> WireError {
    WireError::ReqErr {
        code: ErrorCode::new("session_already_exists"),
        message: "connection already has a session attached".to_string(),
    }
}

/// Accepts WebSocket connections and dispatches wire messages to an
/// [`Application`].
pub struct Server<A: Application> {
    shared: Arc<Shared<A>>,
    listener: WsListener,
    next_id: AtomicU64,
    connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,
}

impl<A: Application> Server<A> {
    /// Bind a listener and construct a server around it.
    pub async fn bind(address: &str, config: ServerConfig, app: A) -> Result<Self, ServerError> {
        let listener = WsListener::bind(address).await?;
        let shared = Arc::new(Shared {
            session_registry: SessionRegistry::new(config.max_session_connections),
            config,
            app: Arc::new(app),
            env: SystemEnv::new(),
        });
        Ok(Self { shared, listener, next_id: AtomicU64::new(1), connections: Arc::new(RwLock::new(HashMap::new())) })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.listener.local_addr()
    }

    /// Accept connections until the process is interrupted or the
    /// listener fails. Runs forever on success.
    pub async fn run(&self) -> Result<(), ServerError> {
        loop {
            let ws = match self.listener.accept().await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    continue;
                },
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let shared = Arc::clone(&self.shared);
            let connections = Arc::clone(&self.connections);

            tokio::spawn(async move {
                serve_connection(id, ws, shared, connections).await;
            });
        }
    }

    /// Drain in-flight requests up to `self.shared.config.shutdown_drain`,
    /// then cancel every remaining connection's handler tasks.
    pub async fn shutdown(&self) {
        let connections = self.connections.read().await;
        tracing::info!(count = connections.len(), "shutting down, draining in-flight requests");

        let deadline = self.shared.config.shutdown_drain;
        let drain = async {
            loop {
                let all_idle =
                    connections.values().all(|conn| conn.request_registry().outstanding_count() == 0);
                if all_idle {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        let _ = tokio::time::timeout(deadline, drain).await;

        for conn in connections.values() {
            conn.cancellation().cancel();
        }
    }
}

async fn serve_connection<A: Application>(
    id: ConnectionId,
    ws: WsConnection,
    shared: Arc<Shared<A>>,
    connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,
) {
    let (mut sender, mut receiver) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<bytes::Bytes>();
    let conn = Connection::new(
        id,
        outbound_tx,
        Arc::clone(&shared) as Arc<dyn SessionOps>,
        shared.config.max_concurrent_handlers,
    );

    connections.write().await.insert(id, Arc::clone(&conn));

    let writer_cancel = conn.cancellation();
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
        // Drain whatever was already queued (e.g. a reply enqueued just
        // before the connection was cancelled) before closing.
        while let Ok(frame) = outbound_rx.try_recv() {
            let _ = sender.send(frame).await;
        }
        let _ = sender.close().await;
    });

    shared.app.on_client_connected(&conn).await;

    let connection_cancel = conn.cancellation();
    loop {
        let frame = tokio::select! {
            biased;
            () = connection_cancel.cancelled() => break,
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

        if bytes.len() > shared.config.max_frame_size {
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

        dispatch(message, &conn, &shared);
    }

    conn.cancellation().cancel();
    connections.write().await.remove(&id);
    conn.request_registry().disconnect_all();
    if let Some(session) = conn.session().await {
        shared.session_registry.detach(session.key(), &conn).await;
    }
    conn.set_session(None).await;

    let _ = writer.await;
    shared.app.on_client_disconnected(&conn).await;
}

fn dispatch<A: Application>(message: Message, conn: &Arc<Connection>, shared: &Arc<Shared<A>>) {
    match message {
        Message::Signal { name, payload } => {
            let conn = Arc::clone(conn);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                let ctx = HandlerContext::new(None, conn.cancellation());
                shared.app.on_signal(&ctx, &conn, name.as_str(), payload).await;
            });
        },

        Message::Request { id, name, payload } if name.as_str() == RESTORE_SESSION => {
            let conn = Arc::clone(conn);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                let key = String::from_utf8_lossy(payload.data()).into_owned();
                if let Err(err) = shared.restore_session(&conn, id, &key).await {
                    reply_error(&conn, id, &err);
                }
            });
        },

        Message::Request { id, name, .. } if name.as_str() == CLOSE_SESSION => {
            let conn = Arc::clone(conn);
            tokio::spawn(async move {
                if let Err(err) = conn.close_session(id).await {
                    reply_error(&conn, id, &err);
                }
            });
        },

        Message::Request { id, name, payload } => {
            let conn = Arc::clone(conn);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                let _permit = conn.acquire_handler_permit().await;
                let ctx = HandlerContext::new(Some(id), conn.cancellation().child_token());
                let outcome = match shared.config.handler_deadline {
                    Some(deadline) => {
                        match tokio::time::timeout(
                            deadline,
                            shared.app.on_request(&ctx, &conn, name.as_str(), payload),
                        )
                        .await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => Err(WireError::ReqInternalErr),
                        }
                    },
                    None => shared.app.on_request(&ctx, &conn, name.as_str(), payload).await,
                };

                match outcome {
                    Ok(reply_payload) => {
                        let _ = conn.send_message(&Message::new_reply(id, reply_payload));
                    },
                    Err(err) => reply_error(&conn, id, &err),
                }
            });
        },

        Message::Reply { id, payload } => {
            conn.request_registry().resolve_reply(id, payload);
        },

        Message::ErrorReply { id, code, message } => {
            conn.request_registry().resolve_error(id, code.as_str().to_string(), message);
        },

        Message::SpecialRequestReply { .. } => {
            // The server never receives these; a peer that sends one is
            // violating the protocol but not fatally so, and is ignored.
        },
    }
}

fn reply_error(conn: &Arc<Connection>, id: MessageIdentifier, err: &WireError) {
    let (code, message) = err.wire_code_and_message();
    let _ = conn.send_message(&Message::new_error_reply(id, code, message));
}
