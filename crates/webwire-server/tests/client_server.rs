//! End-to-end tests driving a real [`Server`] over loopback TCP against a
//! real `webwire-client::Client`: disconnect-hook identity, session
//! destruction, offline session closure, the max-concurrent-session-
//! connections cap, and internal error opacity.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use webwire_client::{Client, ClientConfig, ClientHooks};
use webwire_core::{
    LookupError, LookupOutcome, SessionInfo, SessionManager, SessionValue, WireError,
};
use webwire_proto::{Encoding, Payload};
use webwire_server::{Application, Connection, HandlerContext, Server, ServerConfig};

/// Poll until a client's reader task has observed the disconnect and moved
/// off [`webwire_client::Status::Connected`]. `close()` only cancels the
/// connection; the state transition happens asynchronously once the reader
/// task notices.
async fn wait_until_disconnected(client: &Client) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while client.status().await == webwire_client::Status::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client observed disconnect within 1s");
}

/// In-memory session persistence, enough to exercise `RestoreSession`
/// without any external storage.
#[derive(Default)]
struct InMemorySessionManager {
    store: Mutex<HashMap<String, (std::time::Instant, std::time::Instant, SessionInfo)>>,
}

#[async_trait]
impl SessionManager for InMemorySessionManager {
    async fn session_created(
        &self,
        key: &str,
        info: &HashMap<String, SessionValue>,
    ) -> Result<(), String> {
        let now = std::time::Instant::now();
        self.store
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), (now, now, SessionInfo::from_map(info.clone())));
        Ok(())
    }

    async fn session_lookup(&self, key: &str) -> LookupOutcome {
        self.store
            .lock()
            .expect("lock poisoned")
            .get(key)
            .map(|(creation, last_lookup, info)| webwire_core::SessionLookupResult {
                creation: *creation,
                last_lookup: *last_lookup,
                info: info.copy(),
            })
            .ok_or(LookupError::NotFound)
    }

    async fn session_closed(&self, key: &str) -> Result<(), String> {
        self.store.lock().expect("lock poisoned").remove(key);
        Ok(())
    }
}

/// Exercises every request name the scenarios below need: `login` creates a
/// session and replies with its key; `verify-session-created` and
/// `test-request` assert on the connection's current session state, failing
/// the request (as a `ReqErr`) if the assertion doesn't hold.
struct ScenarioApplication;

impl ScenarioApplication {
    fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Application for ScenarioApplication {
    async fn on_request(
        &self,
        ctx: &HandlerContext,
        conn: &Arc<Connection>,
        name: &str,
        payload: Payload,
    ) -> Result<Payload, WireError> {
        match name {
            "login" => {
                let id = ctx.request_id().expect("login is a request, not a signal");
                conn.create_session(id, SessionInfo::new()).await?;
                let key = conn.session().await.expect("just created").key().to_string();
                Ok(Payload::new(Encoding::Utf8, key.into_bytes()))
            },

            "verify-session-created" => {
                let expected = String::from_utf8_lossy(payload.data()).into_owned();
                let actual = conn.session().await.map(|s| s.key().to_string());
                if actual.as_deref() == Some(expected.as_str()) {
                    Ok(Payload::new(Encoding::Binary, Vec::new()))
                } else {
                    Err(WireError::ReqErr {
                        code: webwire_proto::ErrorCode::new("assertion_failed"),
                        message: format!("expected session {expected:?}, got {actual:?}"),
                    })
                }
            },

            "test-request" => {
                if conn.session().await.is_none() {
                    Ok(Payload::new(Encoding::Binary, Vec::new()))
                } else {
                    Err(WireError::ReqErr {
                        code: webwire_proto::ErrorCode::new("assertion_failed"),
                        message: "expected no session attached".to_string(),
                    })
                }
            },

            "boom" => Err(WireError::ReqInternalErr),

            other => panic!("scenario application received unexpected request {other:?}"),
        }
    }
}

#[tokio::test]
async fn scenario_3_disconnect_hook_sees_the_same_connection_identity() {
    let connected = Arc::new(Mutex::new(Vec::new()));
    let disconnected = Arc::new(Mutex::new(Vec::new()));

    struct HookApp {
        connected: Arc<Mutex<Vec<u64>>>,
        disconnected: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl Application for HookApp {
        async fn on_request(
            &self,
            _ctx: &HandlerContext,
            _conn: &Arc<Connection>,
            _name: &str,
            payload: Payload,
        ) -> Result<Payload, WireError> {
            Ok(payload)
        }

        async fn on_client_connected(&self, conn: &Arc<Connection>) {
            self.connected.lock().expect("lock poisoned").push(conn.id());
        }

        async fn on_client_disconnected(&self, conn: &Arc<Connection>) {
            self.disconnected.lock().expect("lock poisoned").push(conn.id());
        }
    }

    let app = HookApp { connected: Arc::clone(&connected), disconnected: Arc::clone(&disconnected) };
    let server = Server::bind("127.0.0.1:0", ServerConfig::new(), app).await.expect("bind");
    let addr = server.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let client = Client::new(ClientConfig::new(), ClientHooks::new());
    client.connect(&format!("ws://{addr}")).await.expect("connect");

    // Give the server a moment to run on_client_connected.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let connected_id = connected.lock().expect("lock poisoned").first().copied().expect("connected hook fired");

    client.close().await.expect("close");

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if disconnected.lock().expect("lock poisoned").contains(&connected_id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("disconnect hook fired within 1s with matching identity");
}

#[tokio::test]
async fn scenario_4_client_initiated_session_destruction_four_steps() {
    let app = ScenarioApplication::new();
    let server = Server::bind("127.0.0.1:0", ServerConfig::new(), app).await.expect("bind");
    let addr = server.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let session_created_key = Arc::new(Mutex::new(None));
    let session_closed = Arc::new(AtomicBool::new(false));
    let created_flag = Arc::clone(&session_created_key);
    let closed_flag = Arc::clone(&session_closed);

    let hooks = ClientHooks::new()
        .with_on_session_created(move |session| {
            *created_flag.lock().expect("lock poisoned") = Some(session.key().to_string());
        })
        .with_on_session_closed(move || {
            closed_flag.store(true, Ordering::SeqCst);
        });

    let client = Client::new(ClientConfig::new(), hooks);
    client.connect(&format!("ws://{addr}")).await.expect("connect");

    let reply =
        client.request("login", Payload::new(Encoding::Binary, Vec::new())).await.expect("login");
    let key = String::from_utf8(reply.into_bytes().to_vec()).expect("utf8 key");
    assert!(!key.is_empty());

    assert_eq!(client.session().await.expect("session set").key(), key);
    assert_eq!(session_created_key.lock().expect("lock poisoned").as_deref(), Some(key.as_str()));

    client
        .request("verify-session-created", Payload::new(Encoding::Utf8, key.clone().into_bytes()))
        .await
        .expect("verify-session-created");

    client.close_session().await.expect("close_session");

    tokio::time::timeout(Duration::from_secs(1), async {
        while !session_closed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("OnSessionClosed fired");

    client
        .request("test-request", Payload::new(Encoding::Binary, Vec::new()))
        .await
        .expect("test-request");
}

#[tokio::test]
async fn scenario_5_offline_session_closure() {
    let manager = Arc::new(InMemorySessionManager::default());
    let config = ServerConfig::new().with_session_manager(Arc::clone(&manager) as _);
    let app = ScenarioApplication::new();
    let server = Server::bind("127.0.0.1:0", config, app).await.expect("bind");
    let addr = server.local_addr().expect("local_addr");
    let url = format!("ws://{addr}");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let client = Client::new(ClientConfig::new(), ClientHooks::new());
    client.connect(&url).await.expect("connect");
    client.request("login", Payload::new(Encoding::Binary, Vec::new())).await.expect("login");

    let key = client.session().await.expect("session attached").key().to_string();
    assert!(!key.is_empty());

    client.close().await.expect("close");
    wait_until_disconnected(&client).await;

    // Offline close: no network round-trip, local session just disappears.
    client.close_session().await.expect("offline close_session");
    assert!(client.session().await.is_none());

    client.connect(&url).await.expect("reconnect");
    client
        .request("test-request", Payload::new(Encoding::Binary, Vec::new()))
        .await
        .expect("server has no session attached for the reconnected, anonymous connection");
}

#[tokio::test]
async fn scenario_6_max_concurrent_session_connections() {
    let manager = Arc::new(InMemorySessionManager::default());
    let config = ServerConfig::new()
        .with_max_session_connections(4)
        .with_session_manager(Arc::clone(&manager) as _);
    let app = ScenarioApplication::new();
    let server = Server::bind("127.0.0.1:0", config, app).await.expect("bind");
    let addr = server.local_addr().expect("local_addr");
    let url = format!("ws://{addr}");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let first = Client::new(ClientConfig::new(), ClientHooks::new());
    first.connect(&url).await.expect("connect");
    let reply =
        first.request("login", Payload::new(Encoding::Binary, Vec::new())).await.expect("login");
    let key = String::from_utf8(reply.into_bytes().to_vec()).expect("utf8 key");
    assert_eq!(first.session().await.expect("session").key(), key);

    let mut restored = Vec::new();
    for _ in 0..3 {
        let client = Client::new(ClientConfig::new(), ClientHooks::new());
        client.connect(&url).await.expect("connect");
        client.restore_session(&key).await.expect("restore succeeds within the cap");
        restored.push(client);
    }

    let fifth = Client::new(ClientConfig::new(), ClientHooks::new());
    fifth.connect(&url).await.expect("connect");
    let err = fifth.restore_session(&key).await.unwrap_err();
    assert!(matches!(
        err,
        webwire_client::ClientError::Wire(WireError::MaxSessConnsReachedErr)
    ));
}

#[tokio::test]
async fn scenario_7_internal_error_is_opaque_to_the_client() {
    let app = ScenarioApplication::new();
    let server = Server::bind("127.0.0.1:0", ServerConfig::new(), app).await.expect("bind");
    let addr = server.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let client = Client::new(ClientConfig::new(), ClientHooks::new());
    client.connect(&format!("ws://{addr}")).await.expect("connect");

    let err = client.request("boom", Payload::new(Encoding::Binary, Vec::new())).await.unwrap_err();
    assert!(matches!(err, webwire_client::ClientError::Wire(WireError::ReqInternalErr)));
}
