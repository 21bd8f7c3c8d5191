//! Alpaca protocol vocabulary: status codes, device types, command tables

pub mod command;
pub mod device_type;
pub mod status;

use serde::{Deserialize, Serialize};

pub use command::{Access, COMMON_COMMANDS, CommandEntry, CommandTable, Verb};
pub use device_type::DeviceType;
pub use status::AlpacaStatus;

/// Alpaca API version served under `/api/v1`
pub const API_VERSION: u32 = 1;

/// ASCOM interface version reported by every device
pub const INTERFACE_VERSION: i32 = 1;

/// Default TCP port for the Alpaca HTTP listener
pub const DEFAULT_ALPACA_PORT: u16 = 6800;

/// Well-known UDP port for discovery
pub const DISCOVERY_PORT: u16 = 32227;

/// Datagram a client broadcasts to find servers
pub const DISCOVERY_QUERY: &str = "alpacadiscovery1";

/// Key of the value field in command responses
pub const VALUE: &str = "Value";

/// One row of `/management/v1/configureddevices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredDevice {
    #[serde(rename = "DeviceName")]
    pub device_name: String,
    #[serde(rename = "DeviceType")]
    pub device_type: String,
    #[serde(rename = "DeviceNumber")]
    pub device_number: u32,
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
}

/// Envelope of a management response, keeping only the value
#[derive(Debug, Clone, Deserialize)]
pub struct ValueResponse<T> {
    #[serde(rename = "Value")]
    pub value: T,
}
