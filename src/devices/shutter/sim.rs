//! Simulated roll-off shutter

use std::time::{Duration, Instant};

use super::ShutterActuator;
use crate::Result;
use crate::devices::ShutterStatus;

const TRAVEL: Duration = Duration::from_secs(10);

/// Shutter that reaches its end switch a fixed time after being driven
#[derive(Debug)]
pub struct SimShutterActuator {
    status: ShutterStatus,
    travel: Option<(ShutterStatus, Instant)>,
    stalled: bool,
}

impl SimShutterActuator {
    /// Closed shutter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: ShutterStatus::Closed,
            travel: None,
            stalled: false,
        }
    }

    /// Shutter whose end switches never trip
    #[must_use]
    pub const fn stalled() -> Self {
        Self {
            status: ShutterStatus::Closed,
            travel: None,
            stalled: true,
        }
    }

    fn drive(&mut self, done: ShutterStatus, moving: ShutterStatus, now: Instant) {
        if self.status != done {
            self.status = moving;
            self.travel = Some((done, now));
        }
    }
}

impl Default for SimShutterActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutterActuator for SimShutterActuator {
    fn sense(&mut self, now: Instant) -> Result<ShutterStatus> {
        if let Some((done, started)) = self.travel {
            if !self.stalled && now.saturating_duration_since(started) >= TRAVEL {
                self.status = done;
                self.travel = None;
            }
        }
        Ok(self.status)
    }

    fn open(&mut self, now: Instant) -> Result<()> {
        self.drive(ShutterStatus::Open, ShutterStatus::Opening, now);
        Ok(())
    }

    fn close(&mut self, now: Instant) -> Result<()> {
        self.drive(ShutterStatus::Closed, ShutterStatus::Closing, now);
        Ok(())
    }

    fn stop(&mut self, _now: Instant) -> Result<()> {
        if self.status.is_moving() {
            // part way is reported as open
            self.status = ShutterStatus::Open;
            self.travel = None;
        }
        Ok(())
    }
}
