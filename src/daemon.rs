//! Daemon - the main server process
//!
//! Builds the device registry from configuration and runs the Alpaca
//! listener, the scheduler and the discovery responder until shutdown.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Config;
use crate::device::Device;
use crate::devices::{Camera, Dome, Shutter, Telescope};
use crate::discovery::{DiscoveryClient, DiscoveryConfig, Responder, spawn_for_device};
use crate::registry::{Registry, RegistryBuilder};
use crate::scheduler::Scheduler;
use crate::server::AlpacaServer;
use crate::{Error, Result};

/// The Alpaca daemon - owns the configuration and the device registry
pub struct Daemon {
    config: Config,
    registry: Arc<Registry>,
}

impl Daemon {
    /// Create the daemon and register its devices
    ///
    /// # Errors
    ///
    /// Returns error if a device cannot be constructed
    pub fn new(config: Config) -> Result<Self> {
        let registry = build_registry(&config)?;
        if registry.is_empty() {
            tracing::warn!("no devices configured");
        }
        Ok(Self {
            config,
            registry: Arc::new(registry),
        })
    }

    /// Registered devices
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Bind every listener and start the background tasks
    ///
    /// # Errors
    ///
    /// Returns error if the Alpaca or discovery port cannot be bound
    pub async fn start(self) -> Result<Running> {
        let mut stops = Vec::new();

        let listen = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let server = AlpacaServer::bind(
            listen,
            Arc::clone(&self.registry),
            self.config.server.clone(),
        )
        .await?;
        let addr = server.local_addr()?;
        let (tx, rx) = mpsc::channel::<()>(1);
        stops.push(tx);
        let server = server.spawn(rx);

        let (tx, rx) = mpsc::channel::<()>(1);
        stops.push(tx);
        let scheduler =
            Scheduler::new(Arc::clone(&self.registry), self.config.scheduler).spawn(rx);

        let (responder, discovery_addr) = if self.config.discovery.responder {
            let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.discovery.port));
            let responder = Responder::bind(bind, addr.port()).await?;
            let local = responder.local_addr()?;
            let (tx, rx) = mpsc::channel::<()>(1);
            stops.push(tx);
            (Some(responder.spawn(rx)), Some(local))
        } else {
            tracing::info!("discovery responder disabled");
            (None, None)
        };

        self.start_discovery();

        tracing::info!(
            %addr,
            devices = self.registry.len(),
            discovery = ?discovery_addr,
            "alpaca server ready"
        );

        Ok(Running {
            addr,
            discovery_addr,
            registry: self.registry,
            stops,
            server,
            scheduler,
            responder,
        })
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup fails or the listener stops with an error
    pub async fn run(self) -> Result<()> {
        let running = self.start().await?;

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        shutdown_rx.recv().await;
        tracing::info!("shutting down");
        running.shutdown().await
    }

    /// Launch one discovery run for every device that asks for peers
    fn start_discovery(&self) {
        let wanting: Vec<&Arc<dyn Device>> = self
            .registry
            .devices()
            .iter()
            .filter(|d| d.wants_discovery())
            .collect();
        if wanting.is_empty() {
            return;
        }

        let config = DiscoveryConfig {
            port: self.config.discovery.port,
            allow_list: Some(self.config.discovery.allow_list.clone()),
            ..DiscoveryConfig::default()
        };
        let client = match DiscoveryClient::with_http(config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "discovery client unavailable");
                return;
            }
        };

        for device in wanting {
            if let Err(e) = spawn_for_device(Arc::clone(device), Arc::clone(&client)) {
                tracing::warn!(device = %device.core().name(), error = %e, "discovery not started");
            }
        }
    }
}

/// Handles to a started daemon
pub struct Running {
    /// Address of the Alpaca listener
    pub addr: SocketAddr,
    /// Address of the discovery responder, when enabled
    pub discovery_addr: Option<SocketAddr>,
    registry: Arc<Registry>,
    stops: Vec<mpsc::Sender<()>>,
    server: JoinHandle<Result<()>>,
    scheduler: JoinHandle<()>,
    responder: Option<JoinHandle<()>>,
}

impl Running {
    /// Registered devices
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stop the listener, scheduler and responder and wait for them
    ///
    /// # Errors
    ///
    /// Returns error if the listener ended with an error or a task panicked
    pub async fn shutdown(self) -> Result<()> {
        futures::future::join_all(self.stops.iter().map(|stop| stop.send(()))).await;
        self.scheduler
            .await
            .map_err(|e| Error::Config(format!("scheduler task failed: {e}")))?;
        if let Some(responder) = self.responder {
            responder
                .await
                .map_err(|e| Error::Config(format!("discovery responder task failed: {e}")))?;
        }
        self.server
            .await
            .map_err(|e| Error::Config(format!("server task failed: {e}")))?
    }
}

/// Register the configured simulated devices
///
/// Devices of one kind are numbered from 0 in registration order
///
/// # Errors
///
/// Returns error if a device cannot be constructed
pub fn build_registry(config: &Config) -> Result<Registry> {
    let mut builder = RegistryBuilder::new();
    let counts = config.devices;

    for i in 0..counts.domes {
        let dome = Dome::simulated(format!("Simulated Dome {i}"), config.dome)?;
        builder.register(Arc::new(dome));
    }
    for i in 0..counts.cameras {
        let camera = Camera::simulated(format!("Simulated Camera {i}"), config.camera);
        builder.register(Arc::new(camera));
    }
    for i in 0..counts.telescopes {
        let telescope = Telescope::simulated(format!("Simulated Telescope {i}"), config.telescope)?;
        builder.register(Arc::new(telescope));
    }
    for i in 0..counts.shutters {
        let shutter = Shutter::simulated(format!("Simulated Shutter {i}"), config.shutter)?;
        builder.register(Arc::new(shutter));
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::ServerConfigFile;
    use crate::protocol::DeviceType;

    fn config() -> Config {
        Config::resolve(ServerConfigFile::default(), |_| None).unwrap()
    }

    #[test]
    fn default_registry_serves_one_of_each() {
        let registry = build_registry(&config()).unwrap();
        assert_eq!(registry.len(), 4);
        for kind in [
            DeviceType::Dome,
            DeviceType::Camera,
            DeviceType::Telescope,
            DeviceType::Shutter,
        ] {
            assert!(registry.lookup(kind, 0).is_some(), "{kind} 0 missing");
            assert!(registry.lookup(kind, 1).is_none());
        }
    }

    #[test]
    fn numbers_are_contiguous_per_kind() {
        let mut config = config();
        config.devices.cameras = 3;
        config.devices.domes = 0;
        let registry = build_registry(&config).unwrap();
        for n in 0..3 {
            let camera = registry.lookup(DeviceType::Camera, n).unwrap();
            assert_eq!(camera.core().number(), n);
        }
        assert!(registry.lookup(DeviceType::Dome, 0).is_none());
    }
}
