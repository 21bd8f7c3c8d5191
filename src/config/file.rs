//! TOML configuration file loading
//!
//! Supports `~/.config/alpaca/server/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfigFile {
    /// Listener and discovery settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Scheduler timing
    #[serde(default)]
    pub scheduler: SchedulerFileConfig,

    /// How many simulated devices of each kind to serve
    #[serde(default)]
    pub devices: DevicesFileConfig,

    /// Dome tuning
    #[serde(default)]
    pub dome: DomeFileConfig,

    /// Standalone shutter tuning
    #[serde(default)]
    pub shutter: ShutterFileConfig,

    /// Observing site used by telescopes
    #[serde(default)]
    pub telescope: TelescopeFileConfig,
}

/// `[server]` section
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub discovery_port: Option<u16>,
    /// Answer discovery broadcasts
    pub discovery: Option<bool>,
    pub allow_list: Option<PathBuf>,
    /// Response buffer capacity in bytes
    pub buffer_capacity: Option<usize>,
    pub server_name: Option<String>,
    pub location: Option<String>,
}

/// `[scheduler]` section
#[derive(Debug, Default, Deserialize)]
pub struct SchedulerFileConfig {
    pub floor_us: Option<u64>,
    pub ceiling_ms: Option<u64>,
    pub watchdog_interval_secs: Option<u64>,
}

/// `[devices]` section
#[derive(Debug, Default, Deserialize)]
pub struct DevicesFileConfig {
    pub domes: Option<u32>,
    pub cameras: Option<u32>,
    pub telescopes: Option<u32>,
    pub shutters: Option<u32>,
}

/// `[dome]` section
#[derive(Debug, Default, Deserialize)]
pub struct DomeFileConfig {
    /// Park and close after this many minutes without a move; 0 disables
    pub idle_move_minutes: Option<u64>,
    /// Drive a shutter found by discovery instead of a local one
    pub remote_shutter: Option<bool>,
}

/// `[shutter]` section
#[derive(Debug, Default, Deserialize)]
pub struct ShutterFileConfig {
    pub travel_timeout_secs: Option<u64>,
}

/// `[telescope]` section
#[derive(Debug, Default, Deserialize)]
pub struct TelescopeFileConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

/// Load the config file from the default location
///
/// Returns `ServerConfigFile::default()` if the file is missing or unparseable
#[must_use]
pub fn load_config_file() -> ServerConfigFile {
    config_file_path().map_or_else(ServerConfigFile::default, |path| load_config_file_at(&path))
}

/// Load the config file at `path`
///
/// Returns `ServerConfigFile::default()` if the file is missing or unparseable
#[must_use]
pub fn load_config_file_at(path: &Path) -> ServerConfigFile {
    if !path.exists() {
        return ServerConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ServerConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ServerConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/alpaca/server/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("alpaca")
            .join("server")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file_at(&dir.path().join("absent.toml"));
        assert!(fc.server.port.is_none());
        assert!(fc.devices.cameras.is_none());
    }

    #[test]
    fn partial_file_overlays_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 11111\ndiscovery = false\n\n[devices]\ncameras = 2\n\n[dome]\nremote_shutter = true\n\n[telescope]\nlatitude = 51.5"
        )
        .unwrap();
        let fc = load_config_file_at(file.path());
        assert_eq!(fc.server.port, Some(11111));
        assert_eq!(fc.server.discovery, Some(false));
        assert_eq!(fc.devices.cameras, Some(2));
        assert_eq!(fc.devices.domes, None);
        assert_eq!(fc.dome.remote_shutter, Some(true));
        assert!(fc.telescope.latitude.is_some_and(|l| (l - 51.5).abs() < 1e-9));
        assert!(fc.scheduler.floor_us.is_none());
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let fc = load_config_file_at(file.path());
        assert!(fc.server.port.is_none());
    }
}
