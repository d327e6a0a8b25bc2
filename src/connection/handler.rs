//! Per-Connection Handler
//!
//! Each accepted client gets one handler task that runs the
//! read / split / dispatch / reply loop until the peer disconnects or a
//! hard error occurs.
//!
//! ## Buffer management
//!
//! TCP is a stream: one read may carry half a command or a dozen of them.
//! Incoming bytes accumulate in a `BytesMut` (4 KiB initial, 4 MiB hard
//! cap) and the frame codec drains every complete frame per pass, which
//! gives pipelining for free — all frames received in one read are
//! answered, in order, before the next read.
//!
//! ## Timeouts and protocol violations
//!
//! Receive and send both run under a 30 second timeout. A receive timeout
//! is transient: the handler just retries, unless shutdown was requested.
//! A frame that is merely incomplete is never an error — the handler waits
//! for more bytes — but a conclusive protocol violation is answered with
//! `-ERR` and the poisoned buffer is discarded while the connection stays
//! open.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::commands::CommandHandler;
use crate::protocol::{parse_tokens, split_frames, RespValue};

/// Initial capacity of the accumulation buffer.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Hard cap on the accumulation buffer (4 MiB).
const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Bytes reserved ahead of each receive.
const RECV_CHUNK_SIZE: usize = 8192;

/// Receive and send timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff after a transient receive error.
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Statistics shared across all connections.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client closed its end of the connection
    #[error("client disconnected")]
    ClientDisconnected,

    /// Accumulation buffer exceeded its hard cap
    #[error("input buffer limit exceeded")]
    BufferFull,

    /// Peer did not drain our reply within the send timeout
    #[error("send timed out")]
    SendTimeout,

    /// Server shutdown was requested while the connection was idle
    #[error("server shutting down")]
    ShuttingDown,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: watch::Receiver<bool>,
    reply_buf: Vec<u8>,
}

impl ConnectionHandler {
    /// Creates a handler over an accepted stream.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            shutdown,
            reply_buf: Vec::new(),
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::ShuttingDown) => {
                debug!(client = %self.addr, "Connection closed for shutdown")
            }
            Err(ConnectionError::Io(e))
                if e.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let (frames, violation) = split_frames(&mut self.buffer);

            for frame in frames {
                let tokens = parse_tokens(&frame);
                let reply = self.command_handler.execute(&tokens);
                self.stats.command_processed();
                self.send_reply(&reply).await?;
            }

            if let Some(e) = violation {
                // A fully-received frame broke the protocol. Answer with an
                // error and discard the poisoned bytes; the connection
                // itself is still usable.
                warn!(client = %self.addr, error = %e, "Protocol violation");
                self.buffer.clear();
                self.send_reply(&RespValue::error(format!("ERR protocol error: {}", e)))
                    .await?;
                continue;
            }

            self.read_more().await?;

            if self.buffer.len() > MAX_BUFFER_SIZE {
                self.send_reply(&RespValue::error("ERR input buffer limit exceeded"))
                    .await?;
                return Err(ConnectionError::BufferFull);
            }
        }
    }

    /// Reads more bytes into the accumulation buffer.
    ///
    /// A receive timeout or transient I/O error is retried; 0 bytes means
    /// the peer closed.
    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        loop {
            if *self.shutdown.borrow() {
                return Err(ConnectionError::ShuttingDown);
            }

            if self.buffer.capacity() - self.buffer.len() < RECV_CHUNK_SIZE {
                self.buffer.reserve(RECV_CHUNK_SIZE);
            }

            match timeout(IO_TIMEOUT, self.stream.get_mut().read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => return Err(ConnectionError::ClientDisconnected),
                Ok(Ok(n)) => {
                    self.stats.bytes_read(n);
                    trace!(client = %self.addr, bytes = n, "Read data");
                    return Ok(());
                }
                Ok(Err(e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                }
                Ok(Err(e)) => return Err(ConnectionError::Io(e)),
                Err(_elapsed) => {
                    // Quiet client. Transient unless shutdown was requested,
                    // which the top of the loop checks.
                    trace!(client = %self.addr, "Receive timeout, retrying");
                }
            }
        }
    }

    /// Writes one reply in full, or fails the connection.
    async fn send_reply(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        self.reply_buf.clear();
        reply.write_to(&mut self.reply_buf)?;

        let write = async {
            self.stream.write_all(&self.reply_buf).await?;
            self.stream.flush().await
        };
        match timeout(IO_TIMEOUT, write).await {
            Ok(Ok(())) => {
                self.stats.bytes_written(self.reply_buf.len());
                trace!(client = %self.addr, bytes = self.reply_buf.len(), "Sent reply");
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_elapsed) => Err(ConnectionError::SendTimeout),
        }
    }
}

/// Convenience wrapper: builds a [`ConnectionHandler`] and runs it,
/// downgrading expected endings to debug logs.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
    }

    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, shutdown);
    let _ = handler.run().await;
}
