//! Per-command usage counters

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::protocol::{AlpacaStatus, Verb};

/// Counters for one command, or the device total
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Counters {
    pub connections: u64,
    pub gets: u64,
    pub puts: u64,
    pub errors: u64,
}

impl Counters {
    fn record(&mut self, verb: Verb, status: AlpacaStatus) {
        self.connections += 1;
        match verb {
            Verb::Get => self.gets += 1,
            Verb::Put => self.puts += 1,
        }
        if !status.is_success() {
            self.errors += 1;
        }
    }
}

/// Usage statistics for one device
#[derive(Debug, Clone)]
pub struct CommandStats {
    per_command: BTreeMap<u16, Counters>,
    total: Counters,
    last_valid: Instant,
    watchdog_tripped: bool,
}

impl CommandStats {
    /// Fresh statistics; the watchdog clock starts at `now`
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            per_command: BTreeMap::new(),
            total: Counters::default(),
            last_valid: now,
            watchdog_tripped: false,
        }
    }

    /// Count one executed command
    ///
    /// Successful commands reset the watchdog clock
    pub fn record(&mut self, id: u16, verb: Verb, status: AlpacaStatus, now: Instant) {
        self.per_command.entry(id).or_default().record(verb, status);
        self.total.record(verb, status);
        if status.is_success() {
            self.last_valid = now;
            self.watchdog_tripped = false;
        }
    }

    /// Counters for one command id
    #[must_use]
    pub fn get(&self, id: u16) -> Counters {
        self.per_command.get(&id).copied().unwrap_or_default()
    }

    #[must_use]
    pub const fn total(&self) -> Counters {
        self.total
    }

    /// Commands seen so far, ordered by id
    pub fn iter(&self) -> impl Iterator<Item = (u16, Counters)> + '_ {
        self.per_command.iter().map(|(id, c)| (*id, *c))
    }

    #[must_use]
    pub const fn last_valid(&self) -> Instant {
        self.last_valid
    }

    /// Whether the watchdog should fire now; fires once per quiet period
    pub fn take_watchdog_expiry(&mut self, timeout: std::time::Duration, now: Instant) -> bool {
        if self.watchdog_tripped || now.saturating_duration_since(self.last_valid) < timeout {
            return false;
        }
        self.watchdog_tripped = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn counts_by_verb_and_status() {
        let now = Instant::now();
        let mut stats = CommandStats::new(now);
        stats.record(3, Verb::Get, AlpacaStatus::Success, now);
        stats.record(3, Verb::Put, AlpacaStatus::InvalidValue, now);
        stats.record(7, Verb::Get, AlpacaStatus::Success, now);

        let c = stats.get(3);
        assert_eq!(c.connections, 2);
        assert_eq!(c.gets, 1);
        assert_eq!(c.puts, 1);
        assert_eq!(c.errors, 1);
        assert_eq!(stats.total().connections, 3);
        assert_eq!(stats.get(99), Counters::default());
    }

    #[test]
    fn failed_commands_do_not_feed_the_watchdog() {
        let start = Instant::now();
        let mut stats = CommandStats::new(start);
        let later = start + Duration::from_secs(10);
        stats.record(1, Verb::Put, AlpacaStatus::InvalidValue, later);
        assert_eq!(stats.last_valid(), start);
        stats.record(1, Verb::Put, AlpacaStatus::Success, later);
        assert_eq!(stats.last_valid(), later);
    }

    #[test]
    fn watchdog_fires_once_until_next_command() {
        let start = Instant::now();
        let mut stats = CommandStats::new(start);
        let timeout = Duration::from_secs(60);

        assert!(!stats.take_watchdog_expiry(timeout, start + Duration::from_secs(30)));
        assert!(stats.take_watchdog_expiry(timeout, start + Duration::from_secs(61)));
        assert!(!stats.take_watchdog_expiry(timeout, start + Duration::from_secs(200)));

        let resumed = start + Duration::from_secs(300);
        stats.record(0, Verb::Get, AlpacaStatus::Success, resumed);
        assert!(stats.take_watchdog_expiry(timeout, resumed + Duration::from_secs(61)));
    }
}
