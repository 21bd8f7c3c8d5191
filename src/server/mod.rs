//! Alpaca TCP server
//!
//! A tokio task accepts connections. Each connection is handed to a
//! blocking worker which parses the request, runs the synchronous device
//! handler and streams the response before closing the socket.

pub mod management;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::Registry;
use crate::wire::DEFAULT_CAPACITY;
use crate::{Error, Result};

/// Settings shared by every connection worker
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Value of the `Server:` header and `ServerName` in the description
    pub server_name: String,
    pub manufacturer: String,
    pub location: String,
    /// Response buffer capacity in bytes
    pub buffer_capacity: usize,
    /// Read and write timeout of a connection
    pub io_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            server_name: "alpaca-server".to_string(),
            manufacturer: "Omni".to_string(),
            location: "Unknown".to_string(),
            buffer_capacity: DEFAULT_CAPACITY,
            io_timeout: Duration::from_secs(5),
        }
    }
}

/// Listening Alpaca server
pub struct AlpacaServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    settings: Arc<ServerSettings>,
}

impl AlpacaServer {
    /// Bind the TCP listener
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<Registry>,
        settings: ServerSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind Alpaca server on {addr}: {e}")))?;
        Ok(Self {
            listener,
            registry,
            settings: Arc::new(settings),
        })
    }

    /// Address actually bound
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until a message arrives on `shutdown`
    ///
    /// # Errors
    ///
    /// Returns error if the listener fails
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Alpaca server listening");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Alpaca server stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    if let Err(e) = self.hand_off(stream, peer) {
                        tracing::warn!(%peer, error = %e, "failed to start connection worker");
                    }
                }
            }
        }
    }

    fn hand_off(&self, stream: tokio::net::TcpStream, peer: SocketAddr) -> Result<()> {
        let stream = stream.into_std()?;
        stream.set_nonblocking(false)?;
        let registry = Arc::clone(&self.registry);
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || {
            router::handle_connection(stream, peer, &registry, &settings);
        });
        Ok(())
    }

    /// Run the server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: mpsc::Receiver<()>) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(shutdown))
    }
}
