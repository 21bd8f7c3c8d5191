//! State every device carries regardless of its kind

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use super::stats::CommandStats;
use crate::discovery::DiscoveryGuard;
use crate::protocol::{AlpacaStatus, DeviceType, Verb};

/// Default command watchdog timeout
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(5 * 60);

/// Number and unique id assigned at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub number: u32,
    pub unique_id: String,
}

/// Common device properties, counters and watchdog input
#[derive(Debug)]
pub struct DeviceCore {
    device_type: DeviceType,
    name: String,
    description: String,
    driver_info: String,
    connected: AtomicBool,
    identity: OnceLock<Identity>,
    stats: Mutex<CommandStats>,
    watchdog: Option<Duration>,
    discovery: DiscoveryGuard,
}

impl DeviceCore {
    /// Create a connected device core without a command watchdog
    pub fn new(device_type: DeviceType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            device_type,
            description: format!("{name} {device_type}"),
            driver_info: format!("{} {device_type} driver", env!("CARGO_PKG_NAME")),
            name,
            connected: AtomicBool::new(true),
            identity: OnceLock::new(),
            stats: Mutex::new(CommandStats::new(Instant::now())),
            watchdog: None,
            discovery: DiscoveryGuard::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Enable the command watchdog
    #[must_use]
    pub const fn with_watchdog(mut self, timeout: Duration) -> Self {
        self.watchdog = Some(timeout);
        self
    }

    #[must_use]
    pub const fn device_type(&self) -> DeviceType {
        self.device_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn driver_info(&self) -> &str {
        &self.driver_info
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Record the registry-assigned identity; later calls are ignored
    pub fn assign_identity(&self, identity: Identity) {
        if self.identity.set(identity).is_err() {
            tracing::warn!(device = %self.name, "identity already assigned");
        }
    }

    /// Device number, `0` before registration
    #[must_use]
    pub fn number(&self) -> u32 {
        self.identity.get().map_or(0, |i| i.number)
    }

    /// Unique id, empty before registration
    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.identity.get().map_or("", |i| i.unique_id.as_str())
    }

    /// Lock the statistics, recovering from a poisoned lock
    pub fn stats(&self) -> MutexGuard<'_, CommandStats> {
        self.stats.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Count one executed command
    pub fn record_command(&self, id: u16, verb: Verb, status: AlpacaStatus) {
        self.stats().record(id, verb, status, Instant::now());
    }

    #[must_use]
    pub const fn watchdog(&self) -> Option<Duration> {
        self.watchdog
    }

    /// Whether the command watchdog expired and has not yet fired
    pub fn take_watchdog_expiry(&self, now: Instant) -> bool {
        self.watchdog
            .is_some_and(|timeout| self.stats().take_watchdog_expiry(timeout, now))
    }

    #[must_use]
    pub const fn discovery(&self) -> &DiscoveryGuard {
        &self.discovery
    }
}
