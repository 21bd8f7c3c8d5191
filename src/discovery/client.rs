//! Discovery client: find Alpaca servers and the devices they serve

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::{DiscoveredDevice, allow_list};
use crate::device::Device;
use crate::protocol::{ConfiguredDevice, DISCOVERY_PORT, DISCOVERY_QUERY, ValueResponse};
use crate::{Error, Result};

/// Settings for one discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Destination of the query datagram
    pub broadcast: IpAddr,
    /// UDP discovery port
    pub port: u16,
    /// How long a single read waits for a reply
    pub read_timeout: Duration,
    /// Read timeouts tolerated before the run ends
    pub max_timeouts: u32,
    /// Extra hosts queried directly
    pub allow_list: Option<PathBuf>,
    /// Timeout of each `configureddevices` query
    pub query_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: DISCOVERY_PORT,
            read_timeout: Duration::from_secs(1),
            max_timeouts: 2,
            allow_list: None,
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Source of a server's configured device list
#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// Fetch the devices served at `server`
    async fn configured_devices(&self, server: SocketAddr) -> Result<Vec<ConfiguredDevice>>;
}

/// Catalog backed by `GET /management/v1/configureddevices`
pub struct HttpCatalog {
    client: reqwest::Client,
}

impl HttpCatalog {
    /// Create a catalog client with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeviceCatalog for HttpCatalog {
    async fn configured_devices(&self, server: SocketAddr) -> Result<Vec<ConfiguredDevice>> {
        let url = format!("http://{server}/management/v1/configureddevices");
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: ValueResponse<Vec<ConfiguredDevice>> = response.json().await?;
        Ok(body.value)
    }
}

/// Extract the `AlpacaPort` of a discovery reply, matching the key in any case
#[must_use]
pub fn parse_reply(payload: &[u8]) -> Option<u16> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("AlpacaPort"))
        .and_then(|(_, v)| v.as_u64())
        .and_then(|port| u16::try_from(port).ok())
}

/// Broadcasts discovery queries and collects peers
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    catalog: Arc<dyn DeviceCatalog>,
}

impl DiscoveryClient {
    #[must_use]
    pub fn new(config: DiscoveryConfig, catalog: Arc<dyn DeviceCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Client querying peers over HTTP
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_http(config: DiscoveryConfig) -> Result<Self> {
        let catalog = HttpCatalog::new(config.query_timeout)?;
        Ok(Self::new(config, Arc::new(catalog)))
    }

    /// Broadcast the query and collect distinct responders
    ///
    /// Reads replies until `max_timeouts` reads have timed out, then appends
    /// the allow-listed hosts
    ///
    /// # Errors
    ///
    /// Returns error if the socket cannot be bound or the query not sent
    pub async fn find_servers(&self) -> Result<Vec<SocketAddr>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        let target = SocketAddr::new(self.config.broadcast, self.config.port);
        socket
            .send_to(DISCOVERY_QUERY.as_bytes(), target)
            .await
            .map_err(|e| Error::Discovery(format!("failed to send query to {target}: {e}")))?;
        tracing::debug!(%target, "discovery query sent");

        let mut servers: Vec<SocketAddr> = Vec::new();
        let mut buf = [0u8; 1024];
        let mut timeouts = 0;
        while timeouts < self.config.max_timeouts {
            match tokio::time::timeout(self.config.read_timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => match parse_reply(&buf[..len]) {
                    Some(port) => {
                        let server = SocketAddr::new(from.ip(), port);
                        if !servers.contains(&server) {
                            tracing::debug!(%server, "discovery reply");
                            servers.push(server);
                        }
                    }
                    None => {
                        tracing::warn!(%from, "ignoring malformed discovery reply");
                    }
                },
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "discovery read failed");
                    timeouts += 1;
                }
                Err(_) => timeouts += 1,
            }
        }

        if let Some(path) = &self.config.allow_list {
            for server in allow_list::load(path) {
                if !servers.contains(&server) {
                    servers.push(server);
                }
            }
        }
        Ok(servers)
    }

    /// Run a full discovery: find servers, then list their devices
    ///
    /// A server whose device list cannot be fetched is logged and skipped
    ///
    /// # Errors
    ///
    /// Returns error if the query cannot be sent
    pub async fn run(&self) -> Result<Vec<DiscoveredDevice>> {
        let servers = self.find_servers().await?;
        let mut found = Vec::new();
        for server in servers {
            match self.catalog.configured_devices(server).await {
                Ok(devices) => {
                    found.extend(devices.into_iter().map(|d| DiscoveredDevice {
                        address: server.ip(),
                        port: server.port(),
                        device_type: d.device_type,
                        device_number: d.device_number,
                        device_name: d.device_name,
                        unique_id: d.unique_id,
                    }));
                }
                Err(e) => {
                    tracing::warn!(%server, error = %e, "failed to list configured devices");
                }
            }
        }
        tracing::info!(devices = found.len(), "discovery finished");
        Ok(found)
    }
}

/// Start a discovery run for `device` on its own task
///
/// Each discovered peer is passed to the device's `process_discovery`. The
/// task resolves to the number of peers delivered.
///
/// # Errors
///
/// Returns `Error::DiscoveryActive` when a run for this device is in progress
pub fn spawn_for_device(
    device: Arc<dyn Device>,
    client: Arc<DiscoveryClient>,
) -> Result<JoinHandle<usize>> {
    let run = device
        .core()
        .discovery()
        .try_start()
        .ok_or_else(|| Error::DiscoveryActive(device.core().name().to_string()))?;

    Ok(tokio::spawn(async move {
        let _run = run;
        match client.run().await {
            Ok(peers) => {
                for peer in &peers {
                    device.process_discovery(peer);
                }
                peers.len()
            }
            Err(e) => {
                tracing::warn!(device = %device.core().name(), error = %e, "discovery failed");
                0
            }
        }
    }))
}
