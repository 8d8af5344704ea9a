//! Development Server
//!
//! A small async TCP server exposing a [`MemoryStore`](crate::store::MemoryStore)
//! over RESP, so several processes can share maps without an external
//! Redis instance. Each accepted connection runs in its own task.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Server                               │
//! │                                                             │
//! │   accept() ──> spawn ┌───────────────────────────────┐      │
//! │                      │       ConnectionHandler       │      │
//! │                      │  read -> parse -> execute ──┐ │      │
//! │                      │            reply <──────────┘ │      │
//! │                      └───────────────┬───────────────┘      │
//! │                                      ▼                      │
//! │                              CommandHandler                 │
//! │                                      │                      │
//! │                                      ▼                      │
//! │                               MemoryStore                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use redmap::server::Server;
//!
//! # async fn run() -> std::io::Result<()> {
//! let server = Server::bind("127.0.0.1:6379").await?;
//! server.run().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod connection;

// Re-export commonly used types
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};

use crate::store::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// The development server: a bound listener plus its shared engine.
pub struct Server {
    listener: TcpListener,
    store: Arc<MemoryStore>,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Binds a listener on the given address with a fresh engine.
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        Self::bind_with_store(addr, Arc::new(MemoryStore::new())).await
    }

    /// Binds a listener serving an existing engine.
    ///
    /// Useful when the same process also accesses the engine directly.
    pub async fn bind_with_store(
        addr: &str,
        store: Arc<MemoryStore>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            listener,
            store,
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// The address the server is actually bound to.
    ///
    /// Needed when binding to port 0 for tests.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The engine behind the server.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// The shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections forever, spawning one task per client.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let commands = CommandHandler::new(Arc::clone(&self.store));
                    let stats = Arc::clone(&self.stats);
                    tokio::spawn(handle_connection(stream, addr, commands, stats));
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}
