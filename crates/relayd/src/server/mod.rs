//! TCP server for the relay daemon.
//!
//! The server:
//! - Listens on a TCP port for client connections
//! - Spawns a `ConnectionHandler` driving a `Session` for each client
//! - Spawns a writer task per client draining its outbound queue
//! - Drops a client whose socket stops accepting writes
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│     Session     │────▶ RegistryHandle
//! │  (read half)    │     │ (LineProtocol)  │
//! └─────────────────┘     └─────────────────┘
//!                                  ▲ outbox
//! ┌─────────────────┐              │
//! │  writer task    │◀─────────────┘ (also fed by the registry)
//! │  (write half)   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{spawn_writer, CloseReason, ConnectionHandler, Flow, LineProtocol};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use relay_core::SessionId;
use relay_protocol::LineCodec;

use crate::config::RelayConfig;
use crate::registry::RegistryHandle;
use crate::session::Session;

/// TCP server for the relay daemon.
///
/// Accepts client connections and wires each one to a `Session`.
pub struct RelayServer {
    /// Address to bind when `run` is used
    bind_addr: String,

    /// Codec template cloned for every connection
    codec: LineCodec,

    /// Longest a single outbound write may take before the client is dropped
    write_timeout: Duration,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session IDs
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Creates a new relay server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address and line framing settings
    /// * `registry` - Handle to the session registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        config: &RelayConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            codec: config.codec(),
            write_timeout: config.write_timeout(),
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(1),
        }
    }

    /// Returns the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.bind_addr.clone(),
                error: e.to_string(),
            })?;

        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: self.bind_addr.clone(),
            error: e.to_string(),
        })?;

        info!(addr = %local_addr, "Relay server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, SessionId::new(conn_num));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Handles a new client connection by spawning its reader and writer tasks.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, session_id: SessionId) {
        debug!(session_id = %session_id, peer = %peer, "Accepted connection");

        let (reader, writer) = stream.into_split();
        let (outbox, inbox) = mpsc::unbounded_channel();

        let writer_closed = self.cancel_token.child_token();

        let writer_task = spawn_writer(
            writer,
            self.codec.clone(),
            inbox,
            session_id,
            self.write_timeout,
            writer_closed.clone(),
        );
        let session = Session::new(session_id, self.registry.clone(), outbox);
        let handler = ConnectionHandler::new(
            reader,
            self.codec.clone(),
            session,
            session_id,
            self.cancel_token.clone(),
        )
        .with_writer_closed(writer_closed);

        tokio::spawn(async move {
            // Dropping the handler drops the session's outbox; the registry
            // dropped its copy on disconnect, so the writer drains and exits.
            let reason = handler.run().await;

            if let Err(e) = writer_task.await {
                debug!(session_id = %session_id, error = %e, "Writer task failed");
            }

            debug!(session_id = %session_id, reason = ?reason, "Connection finished");
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },
}
