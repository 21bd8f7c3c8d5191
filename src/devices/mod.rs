//! Device kinds served by this process
//!
//! Each kind drives its hardware through a capability trait (the adapter)
//! and ships a simulator implementing that trait, so the server runs
//! without any hardware attached.

pub mod camera;
pub mod dome;
pub mod shutter;
pub mod telescope;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

pub use camera::{Camera, CameraSensor, SimCameraSensor};
pub use dome::{Dome, DomeMotor, SimDomeMotor};
pub use shutter::{Shutter, ShutterActuator, SimShutterActuator};
pub use telescope::{MountDrive, SimMountDrive, Telescope};

/// Lock a device mutex, recovering the state if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shutter position reported by domes and standalone shutters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShutterStatus {
    Open,
    Closed,
    Opening,
    Closing,
    Error,
}

impl ShutterStatus {
    /// Wire code reported by `shutterstatus`
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
            Self::Opening => 2,
            Self::Closing => 3,
            Self::Error => 4,
        }
    }

    /// Status for a `shutterstatus` wire code
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Open),
            1 => Some(Self::Closed),
            2 => Some(Self::Opening),
            3 => Some(Self::Closing),
            4 => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether the shutter is travelling
    #[must_use]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }
}

impl fmt::Display for ShutterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Opening => "Opening",
            Self::Closing => "Closing",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving a device through its command path

    use crate::device::Device;
    use crate::protocol::Verb;
    use crate::request::{Params, Request};
    use crate::wire::{DEFAULT_CAPACITY, JsonEncoder};

    /// Run `command` against `device` and parse the response body
    pub fn call(device: &dyn Device, verb: Verb, command: &str, params: &str) -> serde_json::Value {
        let kind = device.core().device_type().name().to_ascii_lowercase();
        let req = Request::from_path(
            "127.0.0.1:1".parse().unwrap(),
            verb,
            &format!("/api/v1/{kind}/0/{command}"),
            Params::parse(params),
        );
        let mut raw = Vec::new();
        let mut out = JsonEncoder::new(&mut raw, DEFAULT_CAPACITY, "test");
        let outcome = device.process_command(&req, &mut out, 1).unwrap();
        if let Some(id) = outcome.id {
            device.core().record_command(id, verb, outcome.status);
        }
        let text = String::from_utf8(raw).unwrap();
        serde_json::from_str(text.split_once("\r\n\r\n").unwrap().1).unwrap()
    }

    pub fn get(device: &dyn Device, command: &str) -> serde_json::Value {
        call(device, Verb::Get, command, "")
    }

    pub fn put(device: &dyn Device, command: &str, params: &str) -> serde_json::Value {
        call(device, Verb::Put, command, params)
    }
}
