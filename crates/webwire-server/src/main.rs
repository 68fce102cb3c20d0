//! `webwire` server binary.
//!
//! This binary wires up a minimal [`Application`] that replies to every
//! request with `session_already_exists`-style framework errors it never
//! actually triggers — it exists to give the crate a runnable entry point
//! and to exercise [`Server::bind`]/[`Server::run`] end to end. Embedding
//! applications are expected to implement their own [`Application`] and
//! call [`Server::bind`] directly rather than run this binary.
//!
//! # Usage
//!
//! ```bash
//! webwire-server --bind 0.0.0.0:9443
//! ```

use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webwire_core::WireError;
use webwire_proto::{Encoding, Payload};
use webwire_server::{Application, Connection, HandlerContext, Server, ServerConfig};

/// Command-line arguments for the reference server binary.
#[derive(Parser, Debug)]
#[command(name = "webwire-server")]
#[command(about = "webwire request/reply and signal messaging server")]
#[command(version)]
struct Args {
    /// Address to bind to.
    #[arg(short, long, default_value = "0.0.0.0:9443")]
    bind: String,

    /// Maximum concurrent connections per session (0 = unlimited).
    #[arg(long, default_value = "0")]
    max_session_connections: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Echoes every request's payload straight back as the reply, and ignores
/// signals. A placeholder for embedding applications to replace.
struct EchoApplication;

#[async_trait]
impl Application for EchoApplication {
    async fn on_request(
        &self,
        _ctx: &HandlerContext,
        _conn: &Arc<Connection>,
        name: &str,
        payload: Payload,
    ) -> Result<Payload, WireError> {
        tracing::debug!(%name, bytes = payload.len(), "echoing request");
        Ok(Payload::new(Encoding::Binary, payload.into_bytes()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config =
        ServerConfig::new().with_max_session_connections(args.max_session_connections);

    let server = Server::bind(&args.bind, config, EchoApplication).await?;
    tracing::info!(address = %server.local_addr()?, "webwire server listening");

    server.run().await?;
    Ok(())
}
