//! Discovery responder: answer broadcast queries with our TCP port

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// Whether `payload` is a discovery query
///
/// Accepts the current `alpacadiscovery<N>` form in any case, plus the
/// older `alpaca discovery` spelling
#[must_use]
pub fn is_query(payload: &[u8]) -> bool {
    let matches = |prefix: &[u8]| {
        payload.len() >= prefix.len() && payload[..prefix.len()].eq_ignore_ascii_case(prefix)
    };
    matches(b"alpacadiscovery") || matches(b"alpaca discovery")
}

/// UDP listener replying `{"AlpacaPort":<port>}` to discovery queries
pub struct Responder {
    socket: UdpSocket,
    reply: Vec<u8>,
}

impl Responder {
    /// Bind the discovery port
    ///
    /// # Errors
    ///
    /// Returns error if the UDP port cannot be bound
    pub async fn bind(addr: SocketAddr, alpaca_port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::Discovery(format!("failed to bind discovery port {addr}: {e}")))?;
        let reply = serde_json::to_vec(&serde_json::json!({ "AlpacaPort": alpaca_port }))?;
        Ok(Self { socket, reply })
    }

    /// Address actually bound
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Answer queries until a message arrives on `shutdown`
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut buf = [0u8; 1024];
        tracing::info!(addr = ?self.socket.local_addr().ok(), "discovery responder listening");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("discovery responder stopping");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) if is_query(&buf[..len]) => {
                        tracing::debug!(%from, "discovery query");
                        if let Err(e) = self.socket.send_to(&self.reply, from).await {
                            tracing::warn!(%from, error = %e, "failed to answer discovery query");
                        }
                    }
                    Ok((len, from)) => {
                        tracing::debug!(%from, len, "ignoring unknown datagram");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "discovery receive failed");
                    }
                },
            }
        }
    }

    /// Run the responder in a background task
    #[must_use]
    pub fn spawn(self, shutdown: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
