//! Standalone shutter or roll-off roof
//!
//! Usually paired with a dome that finds it through discovery.

pub mod commands;
pub mod sim;

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub use sim::SimShutterActuator;

use self::commands as cmd;
use super::{ShutterStatus, lock};
use crate::device::{DEFAULT_WATCHDOG, Device, DeviceCore};
use crate::protocol::{AlpacaStatus, CommandEntry, CommandTable, DeviceType, VALUE};
use crate::request::Request;
use crate::scheduler::StateLog;
use crate::wire::{JsonEncoder, StateItem};
use crate::{Error, Result};

const MOVING_POLL: Duration = Duration::from_millis(100);
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Hardware behind a shutter
pub trait ShutterActuator: Send {
    /// Position as reported by the end switches
    ///
    /// # Errors
    ///
    /// Returns error if the switches cannot be read
    fn sense(&mut self, now: Instant) -> Result<ShutterStatus>;

    /// # Errors
    ///
    /// Returns error if the motor cannot be driven
    fn open(&mut self, now: Instant) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the motor cannot be driven
    fn close(&mut self, now: Instant) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the motor cannot be stopped
    fn stop(&mut self, now: Instant) -> Result<()>;

    fn can_set_altitude(&self) -> bool {
        false
    }

    /// # Errors
    ///
    /// Returns error if the shutter has no altitude control
    fn set_altitude(&mut self, _altitude: f64) -> Result<()> {
        Err(Error::alpaca(
            AlpacaStatus::MethodNotImplemented,
            "SlewToAltitude not supported",
        ))
    }
}

/// Shutter tuning
#[derive(Debug, Clone, Copy)]
pub struct ShutterSettings {
    /// Longest allowed travel before the shutter is stopped in error
    pub travel_timeout: Duration,
    /// Command watchdog; closes the shutter
    pub watchdog: Duration,
}

impl Default for ShutterSettings {
    fn default() -> Self {
        Self {
            travel_timeout: Duration::from_secs(60),
            watchdog: DEFAULT_WATCHDOG,
        }
    }
}

struct ShutterInner {
    actuator: Box<dyn ShutterActuator>,
    status: ShutterStatus,
    travel_started: Option<Instant>,
    altitude: f64,
    log: StateLog<ShutterStatus>,
    fault: Option<String>,
}

impl ShutterInner {
    fn fail(&mut self, message: String, now: Instant) {
        tracing::warn!(%message, "shutter fault, stopping");
        if let Err(e) = self.actuator.stop(now) {
            tracing::warn!(error = %e, "failed to stop shutter");
        }
        self.status = ShutterStatus::Error;
        self.travel_started = None;
        self.fault = Some(message);
    }

    fn open(&mut self, now: Instant) -> Result<()> {
        self.actuator.open(now)?;
        self.begin_travel(ShutterStatus::Open, ShutterStatus::Opening, now);
        Ok(())
    }

    fn close(&mut self, now: Instant) -> Result<()> {
        self.actuator.close(now)?;
        self.begin_travel(ShutterStatus::Closed, ShutterStatus::Closing, now);
        Ok(())
    }

    fn begin_travel(&mut self, done: ShutterStatus, moving: ShutterStatus, now: Instant) {
        self.fault = None;
        if self.status == done {
            return;
        }
        self.status = moving;
        self.travel_started = Some(now);
    }

    fn stop(&mut self, now: Instant) -> Result<()> {
        self.actuator.stop(now)?;
        self.travel_started = None;
        self.status = self.actuator.sense(now)?;
        Ok(())
    }

    fn step(&mut self, travel_timeout: Duration, now: Instant) {
        let reading = match self.actuator.sense(now) {
            Ok(reading) => reading,
            Err(e) => {
                self.fail(e.to_string(), now);
                return;
            }
        };
        let Some(started) = self.travel_started else {
            if self.status != ShutterStatus::Error {
                self.status = reading;
            }
            return;
        };
        let arrived = matches!(
            (self.status, reading),
            (ShutterStatus::Opening, ShutterStatus::Open)
                | (ShutterStatus::Closing, ShutterStatus::Closed)
        );
        if arrived {
            self.status = reading;
            self.travel_started = None;
        } else if now.saturating_duration_since(started) > travel_timeout {
            let message = format!(
                "shutter still {} after {}s",
                self.status,
                travel_timeout.as_secs()
            );
            self.fail(message, now);
        }
    }

    fn state_items(&self) -> Vec<StateItem> {
        vec![
            StateItem::new("Altitude", self.altitude),
            StateItem::new("ShutterStatus", self.status.code()),
            StateItem::new("Slewing", self.status.is_moving()),
        ]
    }
}

/// Alpaca shutter device
pub struct Shutter {
    core: DeviceCore,
    travel_timeout: Duration,
    can_set_altitude: bool,
    inner: Mutex<ShutterInner>,
}

impl Shutter {
    /// Create a shutter driving `actuator`
    ///
    /// # Errors
    ///
    /// Returns error if the end switches cannot be read
    pub fn new(
        name: impl Into<String>,
        mut actuator: Box<dyn ShutterActuator>,
        settings: ShutterSettings,
    ) -> Result<Self> {
        let name = name.into();
        let status = actuator.sense(Instant::now())?;
        let can_set_altitude = actuator.can_set_altitude();
        let inner = ShutterInner {
            status,
            travel_started: None,
            altitude: 0.0,
            log: StateLog::new(name.clone()),
            fault: None,
            actuator,
        };
        Ok(Self {
            core: DeviceCore::new(DeviceType::Shutter, name).with_watchdog(settings.watchdog),
            travel_timeout: settings.travel_timeout,
            can_set_altitude,
            inner: Mutex::new(inner),
        })
    }

    /// Simulated shutter
    ///
    /// # Errors
    ///
    /// Returns error if the simulator cannot be read
    pub fn simulated(name: impl Into<String>, settings: ShutterSettings) -> Result<Self> {
        Self::new(name, Box::new(SimShutterActuator::new()), settings)
    }

    #[must_use]
    pub fn status(&self) -> ShutterStatus {
        lock(&self.inner).status
    }

    /// Advance the travel watchdog at `now`
    pub fn step(&self, now: Instant) -> Duration {
        let mut inner = lock(&self.inner);
        inner.step(self.travel_timeout, now);
        let status = inner.status;
        inner.log.observe(status);
        if status.is_moving() {
            MOVING_POLL
        } else {
            IDLE_POLL
        }
    }
}

impl Device for Shutter {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn commands(&self) -> &'static CommandTable {
        &cmd::TABLE
    }

    fn handle_command(
        &self,
        entry: &CommandEntry,
        req: &Request,
        out: &mut JsonEncoder<'_>,
    ) -> Result<()> {
        let now = Instant::now();
        let mut inner = lock(&self.inner);

        match entry.id {
            cmd::ALTITUDE => {
                out.add_f64(VALUE, inner.altitude, true)?;
            }
            cmd::CAN_SET_ALTITUDE => {
                out.add_bool(VALUE, self.can_set_altitude, true)?;
            }
            cmd::CAN_SET_SHUTTER => {
                out.add_bool(VALUE, true, true)?;
            }
            cmd::SHUTTER_STATUS => {
                out.add_i32(VALUE, inner.status.code(), true)?;
            }
            cmd::ABORT_SLEW | cmd::STOP => {
                inner.stop(now)?;
                tracing::info!(device = %self.core.name(), status = %inner.status, "shutter stopped");
            }
            cmd::CLOSE_SHUTTER => {
                inner.close(now)?;
            }
            cmd::OPEN_SHUTTER => {
                inner.open(now)?;
            }
            cmd::SLEW_TO_ALTITUDE => {
                let altitude = req.params.f64("Altitude")?;
                if !(0.0..=90.0).contains(&altitude) {
                    return Err(Error::invalid_value(format!(
                        "Altitude {altitude} is out of range 0 to 90"
                    )));
                }
                inner.actuator.set_altitude(altitude)?;
                inner.altitude = altitude;
            }
            cmd::READ_ALL => {
                for item in inner.state_items() {
                    out.add_field(&item, true)?;
                }
                out.add_bool("CanSetAltitude", self.can_set_altitude, true)?;
                out.add_bool("CanSetShutter", true, true)?;
                out.add_string("ShutterState", &inner.status.to_string(), true)?;
                out.add_string("Fault", inner.fault.as_deref().unwrap_or_default(), true)?;
            }
            _ => {
                return Err(Error::not_implemented(format!(
                    "'{}' is not implemented",
                    entry.keyword
                )));
            }
        }
        Ok(())
    }

    fn run_state_machine(&self) -> Duration {
        self.step(Instant::now())
    }

    fn device_state(&self) -> Vec<StateItem> {
        lock(&self.inner).state_items()
    }

    fn watchdog_timeout(&self) {
        let mut inner = lock(&self.inner);
        if matches!(inner.status, ShutterStatus::Closed | ShutterStatus::Closing) {
            return;
        }
        tracing::warn!(device = %self.core.name(), "watchdog closing shutter");
        if let Err(e) = inner.close(Instant::now()) {
            tracing::warn!(device = %self.core.name(), error = %e, "failed to close shutter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::{get, put};

    fn shutter(actuator: SimShutterActuator) -> Shutter {
        Shutter::new("roof", Box::new(actuator), ShutterSettings::default()).unwrap()
    }

    #[test]
    fn opens_and_reports_status_codes() {
        let roof = shutter(SimShutterActuator::new());
        assert_eq!(get(&roof, "shutterstatus")["Value"], 1);
        put(&roof, "openshutter", "");
        assert_eq!(get(&roof, "shutterstatus")["Value"], 2);
        assert_eq!(roof.step(Instant::now()), MOVING_POLL);
        roof.step(Instant::now() + Duration::from_secs(11));
        assert_eq!(get(&roof, "shutterstatus")["Value"], 0);
    }

    #[test]
    fn travel_watchdog_stops_a_stalled_shutter() {
        let roof = shutter(SimShutterActuator::stalled());
        put(&roof, "openshutter", "");
        roof.step(Instant::now() + Duration::from_secs(30));
        assert_eq!(roof.status(), ShutterStatus::Opening);
        roof.step(Instant::now() + Duration::from_secs(61));
        assert_eq!(roof.status(), ShutterStatus::Error);
        assert_eq!(get(&roof, "shutterstatus")["Value"], 4);
        let fault = get(&roof, "readall")["Fault"].as_str().unwrap().to_string();
        assert!(fault.contains("Opening"), "{fault}");

        // error holds until the next move
        roof.step(Instant::now() + Duration::from_secs(62));
        assert_eq!(roof.status(), ShutterStatus::Error);
        put(&roof, "closeshutter", "");
        assert_eq!(roof.status(), ShutterStatus::Closing);
    }

    #[test]
    fn stop_leaves_the_shutter_part_open() {
        let roof = shutter(SimShutterActuator::new());
        put(&roof, "openshutter", "");
        put(&roof, "stop", "");
        assert_eq!(roof.status(), ShutterStatus::Open);
    }

    #[test]
    fn command_watchdog_closes() {
        let roof = shutter(SimShutterActuator::new());
        put(&roof, "openshutter", "");
        roof.step(Instant::now() + Duration::from_secs(11));
        roof.watchdog_timeout();
        assert_eq!(roof.status(), ShutterStatus::Closing);
        assert_eq!(roof.core().watchdog(), Some(DEFAULT_WATCHDOG));
    }

    #[test]
    fn altitude_is_not_adjustable() {
        let roof = shutter(SimShutterActuator::new());
        assert_eq!(get(&roof, "cansetaltitude")["Value"], false);
        let body = put(&roof, "slewtoaltitude", "Altitude=45");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::MethodNotImplemented.code());
        let body = put(&roof, "slewtoaltitude", "Altitude=95");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
    }
}
