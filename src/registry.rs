//! Registry of devices served by this process
//!
//! Devices are registered on a [`RegistryBuilder`] during startup. The
//! builder is consumed into an immutable [`Registry`], so lookups during
//! request handling take no lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::BUILD_NUMBER;
use crate::device::{Device, Identity};
use crate::protocol::{AlpacaStatus, DeviceType, Verb};

/// Manufacturer field of generated unique ids ("ALPA")
pub const MANUFACTURER_CODE: u32 = 0x414C_5041;

/// Collects devices at startup and assigns their numbers
#[derive(Default)]
pub struct RegistryBuilder {
    devices: Vec<Arc<dyn Device>>,
    next_number: HashMap<DeviceType, u32>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return its number within its type
    ///
    /// Numbers are assigned per type, contiguous from 0
    pub fn register(&mut self, device: Arc<dyn Device>) -> u32 {
        let core = device.core();
        let device_type = core.device_type();
        let slot = self.next_number.entry(device_type).or_insert(0);
        let number = *slot;
        *slot += 1;

        let unique_id = unique_id(device_type, self.devices.len());
        tracing::info!(
            device = %core.name(),
            %device_type,
            number,
            %unique_id,
            "registered device"
        );
        core.assign_identity(Identity { number, unique_id });
        self.devices.push(device);
        number
    }

    /// Freeze the registry
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            devices: self.devices.into(),
            transaction: AtomicU32::new(1),
            wake: Notify::new(),
        }
    }
}

/// Immutable set of registered devices plus shared runtime counters
pub struct Registry {
    devices: Arc<[Arc<dyn Device>]>,
    transaction: AtomicU32,
    wake: Notify,
}

impl Registry {
    /// Find a device by type and number
    #[must_use]
    pub fn lookup(&self, device_type: DeviceType, number: u32) -> Option<&Arc<dyn Device>> {
        self.devices.iter().find(|d| {
            let core = d.core();
            core.device_type() == device_type && core.number() == number
        })
    }

    /// All devices in registration order
    #[must_use]
    pub fn devices(&self) -> &[Arc<dyn Device>] {
        &self.devices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Next `ServerTransactionID`; strictly increasing, never 0
    pub fn next_transaction_id(&self) -> u32 {
        loop {
            let id = self.transaction.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Count one executed command against `device`
    pub fn record_command_stat(
        &self,
        device: &dyn Device,
        command_id: u16,
        verb: Verb,
        status: AlpacaStatus,
    ) {
        device.core().record_command(command_id, verb, status);
    }

    /// Wake the scheduler so newly armed state is acted on promptly
    pub fn wake_scheduler(&self) {
        self.wake.notify_one();
    }

    /// Notification the scheduler waits on between ticks
    #[must_use]
    pub const fn wake_signal(&self) -> &Notify {
        &self.wake
    }
}

/// Build the unique id for the device at registration `index`
fn unique_id(device_type: DeviceType, index: usize) -> String {
    let index = u16::try_from(index).unwrap_or(u16::MAX).to_be_bytes();
    let serial: [u8; 6] = rand::random();
    let mut tail = [0u8; 8];
    tail[..2].copy_from_slice(&index);
    tail[2..].copy_from_slice(&serial);
    Uuid::from_fields(MANUFACTURER_CODE, BUILD_NUMBER, device_type.code(), &tail)
        .hyphenated()
        .to_string()
        .to_uppercase()
}
