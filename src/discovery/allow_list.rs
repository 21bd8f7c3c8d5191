//! Extra discovery targets read from a plain-text file
//!
//! Hosts on other subnets never see the discovery broadcast. Each line of
//! the allow-list names one such host as `address[:port]`. Lines starting
//! with `#` and lines shorter than 7 characters are ignored.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::protocol::DEFAULT_ALPACA_PORT;

/// Shortest line that can hold a dotted IPv4 address
const MIN_LINE: usize = 7;

/// Parse allow-list text into socket addresses, skipping invalid lines
#[must_use]
pub fn parse(text: &str) -> Vec<SocketAddr> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.len() >= MIN_LINE && !line.starts_with('#'))
        .filter_map(|line| {
            let parsed = parse_entry(line);
            if parsed.is_none() {
                tracing::warn!(line, "ignoring malformed allow-list entry");
            }
            parsed
        })
        .collect()
}

fn parse_entry(line: &str) -> Option<SocketAddr> {
    if let Ok(addr) = line.parse::<SocketAddr>() {
        return Some(addr);
    }
    line.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_ALPACA_PORT))
}

/// Read the allow-list at `path`; a missing file yields an empty list
#[must_use]
pub fn load(path: &Path) -> Vec<SocketAddr> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let entries = parse(&text);
            tracing::debug!(path = %path.display(), count = entries.len(), "loaded allow-list");
            entries
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read allow-list");
            Vec::new()
        }
    }
}
