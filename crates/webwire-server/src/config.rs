//! Server configuration.

use std::{sync::Arc, time::Duration};

use webwire_core::SessionManager;

/// Tunables for a [`crate::Server`].
///
/// Constructed with [`ServerConfig::new`] and then customized with the
/// builder-style `with_*` methods.
pub struct ServerConfig {
    /// Maximum concurrent connections attached to a single session. `0`
    /// means unlimited.
    pub max_session_connections: usize,

    /// Optional persistence adapter. When absent, sessions live only in
    /// the in-memory session registry and vanish on restart.
    pub session_manager: Option<Arc<dyn SessionManager>>,

    /// Deadline applied to an inbound request handler invocation before
    /// the framework gives up waiting on it and replies with an internal
    /// error. `None` means no deadline.
    pub handler_deadline: Option<Duration>,

    /// Maximum accepted frame size, in bytes. Frames larger than this are
    /// rejected and the connection is closed.
    pub max_frame_size: usize,

    /// Upper bound on concurrently in-flight handler tasks per connection,
    /// enforced with a semaphore. `0` means unbounded.
    pub max_concurrent_handlers: usize,

    /// How long [`crate::Server::shutdown`] waits for in-flight handlers
    /// to drain before forcibly closing remaining connections.
    pub shutdown_drain: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_session_connections: 0,
            session_manager: None,
            handler_deadline: Some(Duration::from_secs(30)),
            max_frame_size: 1 << 20,
            max_concurrent_handlers: 256,
            shutdown_drain: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Default configuration: unlimited session connections, no
    /// persistence, a 30s handler deadline, 1 MiB max frame size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of connections a single session may have attached.
    #[must_use]
    pub fn with_max_session_connections(mut self, max: usize) -> Self {
        self.max_session_connections = max;
        self
    }

    /// Configure a persistence adapter for sessions.
    #[must_use]
    pub fn with_session_manager(mut self, manager: Arc<dyn SessionManager>) -> Self {
        self.session_manager = Some(manager);
        self
    }

    /// Override the per-handler deadline.
    #[must_use]
    pub fn with_handler_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.handler_deadline = deadline;
        self
    }

    /// Override the maximum accepted frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Override the per-connection concurrent-handler cap. `0` means
    /// unbounded.
    #[must_use]
    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.max_concurrent_handlers = max;
        self
    }
}
