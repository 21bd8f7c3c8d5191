//! Cooperative state-machine scheduler
//!
//! One task advances every registered device. Each device returns how soon
//! it wants to run again; the scheduler sleeps for the smallest request,
//! clamped to a floor and ceiling, or until a request handler wakes it.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::Registry;

/// Timing knobs for the scheduler loop
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Shortest sleep between ticks
    pub floor: Duration,
    /// Longest sleep between ticks
    pub ceiling: Duration,
    /// How often command watchdogs are checked
    pub watchdog_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_micros(50),
            ceiling: Duration::from_secs(1),
            watchdog_interval: Duration::from_secs(60),
        }
    }
}

/// Clamp a requested delay into `[floor, ceiling]`
#[must_use]
pub fn clamp_delay(requested: Duration, floor: Duration, ceiling: Duration) -> Duration {
    requested.max(floor).min(ceiling.max(floor))
}

/// Drives `run_state_machine` on every device
pub struct Scheduler {
    registry: Arc<Registry>,
    config: SchedulerConfig,
}

impl Scheduler {
    #[must_use]
    pub const fn new(registry: Arc<Registry>, config: SchedulerConfig) -> Self {
        Self { registry, config }
    }

    /// Advance every device once, returning the clamped delay until the next tick
    pub fn tick(&self) -> Duration {
        let mut next = self.config.ceiling;
        for device in self.registry.devices() {
            let step = panic::catch_unwind(AssertUnwindSafe(|| device.run_state_machine()));
            match step {
                Ok(delay) => next = next.min(delay),
                Err(_) => {
                    tracing::error!(device = %device.core().name(), "state machine panicked");
                }
            }
        }
        clamp_delay(next, self.config.floor, self.config.ceiling)
    }

    /// Fire the command watchdog of every device that has been idle too long
    pub fn check_watchdogs(&self, now: Instant) -> usize {
        let mut fired = 0;
        for device in self.registry.devices() {
            if device.core().take_watchdog_expiry(now) {
                tracing::warn!(device = %device.core().name(), "command watchdog expired");
                if panic::catch_unwind(AssertUnwindSafe(|| device.watchdog_timeout())).is_err() {
                    tracing::error!(device = %device.core().name(), "watchdog handler panicked");
                }
                fired += 1;
            }
        }
        fired
    }

    /// Run until a message arrives on `shutdown`
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        tracing::info!(
            devices = self.registry.len(),
            floor = ?self.config.floor,
            ceiling = ?self.config.ceiling,
            "scheduler started"
        );
        let mut last_watchdog = Instant::now();

        loop {
            let delay = self.tick();

            let now = Instant::now();
            if now.duration_since(last_watchdog) >= self.config.watchdog_interval {
                self.check_watchdogs(now);
                last_watchdog = now;
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("scheduler stopping");
                    break;
                }
                () = self.registry.wake_signal().notified() => {}
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run the scheduler in a background task
    #[must_use]
    pub fn spawn(self, shutdown: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Logs each state change of one state machine exactly once
#[derive(Debug)]
pub struct StateLog<S> {
    device: String,
    last: Option<S>,
}

impl<S: Copy + PartialEq + Debug> StateLog<S> {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            last: None,
        }
    }

    /// Note the current state; returns true and logs when it changed
    pub fn observe(&mut self, state: S) -> bool {
        if self.last == Some(state) {
            return false;
        }
        match self.last {
            Some(from) => {
                tracing::info!(device = %self.device, ?from, to = ?state, "state changed");
            }
            None => tracing::debug!(device = %self.device, ?state, "initial state"),
        }
        self.last = Some(state);
        true
    }

    #[must_use]
    pub const fn last(&self) -> Option<S> {
        self.last
    }
}
