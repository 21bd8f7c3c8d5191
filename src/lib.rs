//! Alpaca Server - network device server for observatory hardware
//!
//! This library provides the core functionality for the Alpaca server:
//! - HTTP request parsing and command dispatch
//! - Streaming JSON responses with a fixed field order
//! - A cooperative scheduler driving per-device state machines
//! - UDP discovery of peers and a discovery responder
//! - Simulated domes, cameras, telescopes and shutters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Alpaca clients                      │
//! │      HTTP /api/v1/...   │   UDP alpacadiscovery1     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Daemon                            │
//! │  Server  │  Router  │  Scheduler  │  Discovery       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Registry of devices                     │
//! │   Dome  │  Camera  │  Telescope  │  Shutter          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Capability adapters (simulators)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod device;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod scheduler;
pub mod server;
pub mod wire;

/// Crate version reported in the management description
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Driver build number reported by `driverversion`
pub const BUILD_NUMBER: u16 = 1;

pub use config::Config;
pub use daemon::{Daemon, Running};
pub use device::Device;
pub use error::{Error, Result};
pub use registry::{Registry, RegistryBuilder};
