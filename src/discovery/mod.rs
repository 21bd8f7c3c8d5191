//! Alpaca UDP discovery
//!
//! Clients broadcast `alpacadiscovery1` to UDP port 32227; every server
//! answers with `{"AlpacaPort": <tcp port>}`. The client then asks each
//! responder for `/management/v1/configureddevices`.

pub mod allow_list;
pub mod client;
pub mod guard;
pub mod responder;

use std::net::IpAddr;

pub use client::{DeviceCatalog, DiscoveryClient, DiscoveryConfig, HttpCatalog, spawn_for_device};
pub use guard::DiscoveryGuard;
pub use responder::Responder;

/// A device served by some peer on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: IpAddr,
    pub port: u16,
    pub device_type: String,
    pub device_number: u32,
    pub device_name: String,
    pub unique_id: String,
}
