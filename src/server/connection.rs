//! Per-Connection Handling
//!
//! Each client of the development server gets its own async task running
//! a read-parse-execute-respond loop:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │      Connection loop         │
//! │                              │
//! │  read bytes ──> parse frame  │
//! │       ▲              │       │
//! │       │              ▼       │
//! │  send reply <── execute cmd  │
//! └──────────────────────────────┘
//! ```
//!
//! Incoming bytes accumulate in a `BytesMut` buffer because TCP is a
//! stream: a read may carry half a command or several pipelined commands.

use crate::protocol::{Frame, FrameParser, ParseError};
use crate::server::commands::CommandHandler;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Maximum size for the read buffer (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling.
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

    fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent bytes that are not a valid RESP frame
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Client disconnected normally
    #[error("client disconnected")]
    ClientDisconnected,

    /// Connection closed with a partial command buffered
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// Buffered writer over the TCP stream
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared engine behind it)
    commands: CommandHandler,

    /// Frame parser
    parser: FrameParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new handler for an accepted connection.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            parser: FrameParser::new(),
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-parse-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(command) = self.try_parse_command()? {
                let reply = self.commands.execute(command);
                self.stats.commands_processed.fetch_add(1, Ordering::Relaxed);
                self.send_reply(&reply).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to parse one command from the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed,
                    remaining = self.buffer.len(),
                    "parsed command"
                );
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "parse error");
                Err(ConnectionError::Parse(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        trace!(client = %self.addr, bytes = n, "read data");
        Ok(())
    }

    /// Sends one reply frame to the client.
    async fn send_reply(&mut self, reply: &Frame) -> Result<(), ConnectionError> {
        let wire = reply.encode();
        self.stream.write_all(&wire).await?;
        self.stream.flush().await?;
        self.stats
            .bytes_written
            .fetch_add(wire.len() as u64, Ordering::Relaxed);
        trace!(client = %self.addr, bytes = wire.len(), "sent reply");
        Ok(())
    }
}

/// Creates a handler for an accepted connection and runs it to completion,
/// folding expected disconnect errors into silence.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "connection ended with error");
            }
        }
    }
}
