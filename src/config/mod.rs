//! Configuration management for the Alpaca server
//!
//! Every setting resolves as environment > TOML file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::devices::camera::CameraSettings;
use crate::devices::dome::DomeSettings;
use crate::devices::shutter::ShutterSettings;
use crate::devices::telescope::{Site, TelescopeSettings};
use crate::protocol::{DEFAULT_ALPACA_PORT, DISCOVERY_PORT};
use crate::scheduler::SchedulerConfig;
use crate::server::ServerSettings;
use crate::wire::DEFAULT_CAPACITY;
use crate::{Error, Result};

use self::file::ServerConfigFile;

/// Smallest response buffer that still holds a full header block
const MIN_BUFFER_CAPACITY: usize = 512;

/// Name of the allow-list file inside the data directory
const ALLOW_LIST_FILE: &str = "external_ip_list.txt";

/// Alpaca server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port of the Alpaca API
    pub port: u16,

    /// Discovery responder and client settings
    pub discovery: DiscoverySettings,

    /// Settings shared by every connection worker
    pub server: ServerSettings,

    /// Scheduler timing
    pub scheduler: SchedulerConfig,

    /// Simulated devices to serve
    pub devices: DeviceCounts,

    pub dome: DomeSettings,
    pub camera: CameraSettings,
    pub telescope: TelescopeSettings,
    pub shutter: ShutterSettings,

    /// Path to data directory (allow-list)
    pub data_dir: PathBuf,
}

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Answer discovery broadcasts
    pub responder: bool,
    /// UDP discovery port
    pub port: u16,
    /// Extra hosts queried by discovery runs
    pub allow_list: PathBuf,
}

/// Number of simulated devices of each kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCounts {
    pub domes: u32,
    pub cameras: u32,
    pub telescopes: u32,
    pub shutters: u32,
}

impl Default for DeviceCounts {
    fn default() -> Self {
        Self {
            domes: 1,
            cameras: 1,
            telescopes: 1,
            shutters: 1,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// `config_path` replaces the default file location when given
    ///
    /// # Errors
    ///
    /// Returns error if the resolved settings are inconsistent
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = config_path.map_or_else(file::load_config_file, file::load_config_file_at);
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve settings from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resolved settings are inconsistent
    pub fn resolve(fc: ServerConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Determine data directory (~/.local/share/alpaca/server on Linux)
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from("."),
            |d| d.data_dir().join("alpaca").join("server"),
        );

        // API port (env > toml > default)
        let port = env("ALPACA_PORT")
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_ALPACA_PORT);

        // Discovery (env > toml > default)
        let discovery = DiscoverySettings {
            responder: env("ALPACA_DISCOVERY")
                .and_then(|s| parse_bool(&s))
                .or(fc.server.discovery)
                .unwrap_or(true),
            port: env("ALPACA_DISCOVERY_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.discovery_port)
                .unwrap_or(DISCOVERY_PORT),
            allow_list: env("ALPACA_ALLOW_LIST")
                .map(PathBuf::from)
                .or(fc.server.allow_list)
                .unwrap_or_else(|| data_dir.join(ALLOW_LIST_FILE)),
        };

        let buffer_capacity = fc.server.buffer_capacity.unwrap_or(DEFAULT_CAPACITY);
        if buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(Error::Config(format!(
                "buffer_capacity must be at least {MIN_BUFFER_CAPACITY} bytes, got {buffer_capacity}"
            )));
        }

        let server = ServerSettings {
            server_name: fc.server.server_name.unwrap_or_else(host_name),
            location: fc
                .server
                .location
                .unwrap_or_else(|| "Unknown".to_string()),
            buffer_capacity,
            ..ServerSettings::default()
        };

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            floor: fc
                .scheduler
                .floor_us
                .map_or(defaults.floor, Duration::from_micros),
            ceiling: fc
                .scheduler
                .ceiling_ms
                .map_or(defaults.ceiling, Duration::from_millis),
            watchdog_interval: fc
                .scheduler
                .watchdog_interval_secs
                .map_or(defaults.watchdog_interval, Duration::from_secs),
        };
        if scheduler.floor > scheduler.ceiling {
            return Err(Error::Config(format!(
                "scheduler floor {:?} exceeds ceiling {:?}",
                scheduler.floor, scheduler.ceiling
            )));
        }

        let counts = DeviceCounts::default();
        let devices = DeviceCounts {
            domes: fc.devices.domes.unwrap_or(counts.domes),
            cameras: fc.devices.cameras.unwrap_or(counts.cameras),
            telescopes: fc.devices.telescopes.unwrap_or(counts.telescopes),
            shutters: fc.devices.shutters.unwrap_or(counts.shutters),
        };

        let dome = DomeSettings {
            idle_move_timeout: fc
                .dome
                .idle_move_minutes
                .filter(|&m| m > 0)
                .map(|m| Duration::from_secs(m * 60)),
            remote_shutter: fc.dome.remote_shutter.unwrap_or_default(),
            ..DomeSettings::default()
        };

        let shutter = ShutterSettings {
            travel_timeout: fc
                .shutter
                .travel_timeout_secs
                .map_or(ShutterSettings::default().travel_timeout, Duration::from_secs),
            ..ShutterSettings::default()
        };

        let site = Site {
            latitude: fc.telescope.latitude.unwrap_or_default(),
            longitude: fc.telescope.longitude.unwrap_or_default(),
            elevation: fc.telescope.elevation.unwrap_or_default(),
        };
        if !(-90.0..=90.0).contains(&site.latitude) || !(-180.0..=180.0).contains(&site.longitude)
        {
            return Err(Error::Config(format!(
                "site latitude {} or longitude {} out of range",
                site.latitude, site.longitude
            )));
        }
        let telescope = TelescopeSettings {
            site,
            ..TelescopeSettings::default()
        };

        Ok(Self {
            port,
            discovery,
            server,
            scheduler,
            devices,
            dome,
            camera: CameraSettings::default(),
            telescope,
            shutter,
            data_dir,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "alpaca-server".to_string())
}
