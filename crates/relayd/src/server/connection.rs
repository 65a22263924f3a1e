//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Frames the inbound byte stream into lines
//! - Drives a `LineProtocol` implementation with connect, line and
//!   disconnect callbacks
//! - Stops on EOF, codec/I/O errors, a protocol-requested close, or shutdown
//!
//! Outbound lines never go through the handler. They are pushed into a
//! per-connection queue and written by a separate task (`spawn_writer`),
//! so senders never wait on a slow socket. When that task gives up on a
//! write it cancels the connection's `writer_closed` token, which ends the
//! read loop as well.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_core::SessionId;
use relay_protocol::{CodecError, LineCodec};

/// What the connection should do after a protocol callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading lines.
    Continue,

    /// Close the connection. Lines already queued are still written.
    Close,
}

/// Callbacks the transport invokes for one connection.
///
/// The transport only knows this interface; the session state machine is
/// one implementation of it.
#[async_trait]
pub trait LineProtocol: Send {
    /// Called once, before any line is read.
    async fn on_connect(&mut self) -> Flow;

    /// Called for every complete inbound line, delimiter stripped.
    async fn on_line(&mut self, line: String) -> Flow;

    /// Called once when the connection ends, whatever the cause.
    async fn on_disconnect(&mut self);
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its side.
    Eof,

    /// The protocol asked for the connection to be closed.
    Forced,

    /// Reading or writing failed (I/O error, oversized line, invalid
    /// UTF-8, write timeout).
    Error,

    /// The server is shutting down.
    Shutdown,
}

/// Connection handler for a single client.
pub struct ConnectionHandler<P> {
    /// Line-framed reader for incoming messages
    reader: FramedRead<OwnedReadHalf, LineCodec>,

    /// Protocol state machine for this connection
    protocol: P,

    /// Identifier used in log fields
    session_id: SessionId,

    /// Server-wide shutdown signal
    cancel_token: CancellationToken,

    /// Cancelled by the writer task when the socket can no longer be written
    writer_closed: CancellationToken,
}

impl<P: LineProtocol> ConnectionHandler<P> {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the TCP stream
    /// * `codec` - Line codec (delimiter and length limit)
    /// * `protocol` - Callbacks driven by this connection
    /// * `session_id` - Identifier for logging
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        reader: OwnedReadHalf,
        codec: LineCodec,
        protocol: P,
        session_id: SessionId,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            reader: FramedRead::new(reader, codec),
            protocol,
            session_id,
            cancel_token,
            writer_closed: CancellationToken::new(),
        }
    }

    /// Also ends the connection when `writer_closed` is cancelled.
    pub fn with_writer_closed(mut self, writer_closed: CancellationToken) -> Self {
        self.writer_closed = writer_closed;
        self
    }

    /// Runs the connection handler until the connection ends.
    ///
    /// `on_disconnect` is always called exactly once before returning,
    /// including when `on_connect` itself asks to close.
    pub async fn run(mut self) -> CloseReason {
        let reason = if self.protocol.on_connect().await == Flow::Close {
            CloseReason::Forced
        } else {
            self.process_lines().await
        };

        debug!(session_id = %self.session_id, reason = ?reason, "Connection closing");
        self.protocol.on_disconnect().await;
        reason
    }

    /// Main line processing loop.
    async fn process_lines(&mut self) -> CloseReason {
        loop {
            let next = tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    return CloseReason::Shutdown;
                }
                _ = self.writer_closed.cancelled() => {
                    debug!(session_id = %self.session_id, "Writer closed, dropping connection");
                    return CloseReason::Error;
                }
                next = self.reader.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    debug!(
                        session_id = %self.session_id,
                        len = line.len(),
                        "Received line"
                    );
                    if self.protocol.on_line(line).await == Flow::Close {
                        return CloseReason::Forced;
                    }
                }
                Some(Err(e)) => {
                    debug!(session_id = %self.session_id, error = %e, "Read failed");
                    return CloseReason::Error;
                }
                None => {
                    debug!(session_id = %self.session_id, "Client sent EOF");
                    return CloseReason::Eof;
                }
            }
        }
    }
}

/// Spawns the task that writes a connection's queued lines to its socket.
///
/// The task ends when every sender of `outbox` has been dropped (after
/// writing everything still queued) or when a write fails or takes longer
/// than `write_timeout`. In the failure case `writer_closed` is cancelled
/// so the reader side tears the connection down. The write half is shut
/// down on exit.
pub fn spawn_writer(
    writer: OwnedWriteHalf,
    codec: LineCodec,
    mut outbox: mpsc::UnboundedReceiver<String>,
    session_id: SessionId,
    write_timeout: Duration,
    writer_closed: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, codec);

        while let Some(line) = outbox.recv().await {
            match timeout(write_timeout, sink.send(line)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(session_id = %session_id, error = %e, "Write failed");
                    writer_closed.cancel();
                    break;
                }
                Err(_) => {
                    debug!(session_id = %session_id, "Write timed out");
                    writer_closed.cancel();
                    break;
                }
            }
        }

        // Stop accepting lines so registry sends to this session fail fast.
        outbox.close();

        if let Err(e) = close_sink(&mut sink, write_timeout).await {
            debug!(session_id = %session_id, error = %e, "Failed to shut down writer");
        }
    })
}

async fn close_sink(
    sink: &mut FramedWrite<OwnedWriteHalf, LineCodec>,
    write_timeout: Duration,
) -> Result<(), CodecError> {
    match timeout(write_timeout, SinkExt::<String>::close(sink)).await {
        Ok(result) => result,
        Err(_) => Err(CodecError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "shutdown timed out",
        ))),
    }
}
