//! Rotating dome with shutter
//!
//! Request handlers only arm the rotation state machine in [`state`]; the
//! scheduler advances it, reading the sensors and applying the resulting
//! motor output through the [`DomeMotor`] adapter. A dome without a
//! shutter of its own forwards shutter commands to a discovered peer
//! through [`remote`].

pub mod commands;
pub mod remote;
pub mod sim;
pub mod state;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use remote::{RemoteShutter, ShutterCommand};
pub use sim::SimDomeMotor;
pub use state::{Direction, DomeState, Drive, Goal, Motion, Sensors, Stop};

use self::commands as cmd;
use super::{ShutterStatus, lock};
use crate::device::{DEFAULT_WATCHDOG, Device, DeviceCore};
use crate::discovery::DiscoveredDevice;
use crate::protocol::{AlpacaStatus, CommandEntry, CommandTable, DeviceType, VALUE, Verb};
use crate::request::Request;
use crate::scheduler::StateLog;
use crate::wire::{JsonEncoder, StateItem};
use crate::{Error, Result};

/// How often the idle-move watchdog looks at the dome
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// What the dome hardware supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct DomeCapabilities {
    pub can_find_home: bool,
    pub can_park: bool,
    pub can_set_altitude: bool,
    pub can_set_azimuth: bool,
    pub can_set_park: bool,
    pub can_set_shutter: bool,
    pub can_slave: bool,
    pub can_sync_azimuth: bool,
}

impl DomeCapabilities {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            can_find_home: true,
            can_park: true,
            can_set_altitude: true,
            can_set_azimuth: true,
            can_set_park: true,
            can_set_shutter: true,
            can_slave: true,
            can_sync_azimuth: true,
        }
    }
}

/// One sensor snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomeReadings {
    pub sensors: Sensors,
    pub shutter: ShutterStatus,
}

fn unsupported<T>(what: &str) -> Result<T> {
    Err(Error::alpaca(
        AlpacaStatus::MethodNotImplemented,
        format!("{what} not supported"),
    ))
}

/// Hardware behind a dome
///
/// Errors are reported as `Error::Hardware`, or as an `Error::Alpaca`
/// status when the hardware lacks a feature.
pub trait DomeMotor: Send {
    fn capabilities(&self) -> DomeCapabilities;

    /// Azimuth of the park sensor
    fn park_azimuth(&self) -> f64;

    /// Azimuth of the home sensor
    fn home_azimuth(&self) -> f64;

    /// Read position, sensors and shutter
    ///
    /// # Errors
    ///
    /// Returns error if the hardware cannot be read
    fn sense(&mut self, now: Instant) -> Result<DomeReadings>;

    /// Apply a motor output
    ///
    /// # Errors
    ///
    /// Returns error if the motor cannot be driven
    fn drive(&mut self, drive: Drive, now: Instant) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the position cannot be set
    fn sync_azimuth(&mut self, azimuth: f64) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the park position cannot be moved
    fn set_park(&mut self, _azimuth: f64) -> Result<()> {
        unsupported("Set park")
    }

    /// # Errors
    ///
    /// Returns error if the shutter cannot be commanded
    fn open_shutter(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the shutter cannot be commanded
    fn close_shutter(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the shutter cannot be commanded
    fn stop_shutter(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if there is no switchable power
    fn set_power(&mut self, _on: bool) -> Result<()> {
        unsupported("Power control")
    }

    /// # Errors
    ///
    /// Returns error if there is no switchable power
    fn power(&mut self) -> Result<bool> {
        unsupported("Power status")
    }

    /// # Errors
    ///
    /// Returns error if there is no auxiliary output
    fn set_auxiliary(&mut self, _on: bool) -> Result<()> {
        unsupported("Auxiliary control")
    }

    /// # Errors
    ///
    /// Returns error if there is no auxiliary output
    fn auxiliary(&mut self) -> Result<bool> {
        unsupported("Auxiliary status")
    }
}

/// Dome tuning
#[derive(Debug, Clone, Copy)]
pub struct DomeSettings {
    /// Park the dome and close the shutter after this long without a move
    pub idle_move_timeout: Option<Duration>,
    /// Command watchdog; closes the shutter
    pub watchdog: Duration,
    /// The shutter is a separate device found by discovery
    pub remote_shutter: bool,
}

impl Default for DomeSettings {
    fn default() -> Self {
        Self {
            idle_move_timeout: None,
            watchdog: DEFAULT_WATCHDOG,
            remote_shutter: false,
        }
    }
}

struct DomeInner {
    motor: Box<dyn DomeMotor>,
    motion: Motion,
    sensors: Sensors,
    shutter: ShutterStatus,
    applied: Drive,
    log: StateLog<DomeState>,
    altitude: f64,
    slaved: bool,
    power: bool,
    auxiliary: bool,
    last_move_command: Instant,
    last_idle_check: Instant,
    remote: Option<Arc<RemoteShutter>>,
    fault: Option<String>,
}

impl DomeInner {
    fn apply(&mut self, now: Instant) {
        let drive = self.motion.drive();
        if drive == self.applied {
            return;
        }
        match self.motor.drive(drive, now) {
            Ok(()) => self.applied = drive,
            Err(e) => self.fail(&e, now),
        }
    }

    fn fail(&mut self, e: &Error, now: Instant) {
        tracing::warn!(error = %e, "dome hardware failure, stopping");
        self.motion.stop(Stop::Now, now);
        self.fault = Some(e.to_string());
    }

    /// Status is unreliable until a move command succeeds after a failure
    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(fault) => Err(Error::Hardware(fault.clone())),
            None => Ok(()),
        }
    }

    fn start(&mut self, direction: Direction, goal: Goal, now: Instant) {
        self.fault = None;
        self.motion.start(direction, goal, now);
        self.apply(now);
    }

    fn start_slow(&mut self, direction: Direction, goal: Goal, now: Instant) {
        self.fault = None;
        self.motion.start_slow(direction, goal, now);
        self.apply(now);
    }

    /// Head for a sensor position, or retarget a rotation under way
    fn seek(&mut self, goal: Goal, position: f64, now: Instant) {
        if matches!(
            self.motion.state(),
            DomeState::SpeedingUp | DomeState::Moving
        ) {
            self.motion.set_goal(goal);
        } else {
            let direction = state::sensor_direction(self.sensors.azimuth, position);
            self.start(direction, goal, now);
        }
    }

    fn park(&mut self, now: Instant) {
        self.last_move_command = now;
        if self.sensors.at_park {
            tracing::debug!("dome already at park, command ignored");
            return;
        }
        let position = self.motor.park_azimuth();
        self.seek(Goal::Park, position, now);
    }

    fn find_home(&mut self, now: Instant) {
        self.last_move_command = now;
        if self.sensors.at_home {
            tracing::debug!("dome already at home, command ignored");
            return;
        }
        let position = self.motor.home_azimuth();
        self.seek(Goal::Home, position, now);
    }

    fn close_shutter(&mut self, now: Instant) -> Result<()> {
        self.last_move_command = now;
        self.motor.close_shutter()?;
        self.fault = None;
        if self.shutter != ShutterStatus::Closed {
            self.shutter = ShutterStatus::Closing;
        }
        Ok(())
    }

    fn open_shutter(&mut self, now: Instant) -> Result<()> {
        self.last_move_command = now;
        self.motor.open_shutter()?;
        self.fault = None;
        if self.shutter != ShutterStatus::Open {
            self.shutter = ShutterStatus::Opening;
        }
        Ok(())
    }

    /// Manual rotation; ignored while the dome is already turning
    fn manual(&mut self, direction: Direction, goal: Goal, slow: bool, now: Instant) {
        self.last_move_command = now;
        if self.motion.is_slewing() {
            tracing::debug!("dome already in motion, command ignored");
            return;
        }
        if slow {
            self.start_slow(direction, goal, now);
        } else {
            self.start(direction, goal, now);
        }
    }

    fn state_items(&self) -> Vec<StateItem> {
        vec![
            StateItem::new("Altitude", self.altitude),
            StateItem::new("AtHome", self.sensors.at_home),
            StateItem::new("AtPark", self.sensors.at_park),
            StateItem::new("Azimuth", self.sensors.azimuth),
            StateItem::new("ShutterStatus", self.shutter.code()),
            StateItem::new("Slewing", self.is_moving()),
        ]
    }

    fn is_moving(&self) -> bool {
        !matches!(self.motion.state(), DomeState::Idle | DomeState::Stopped)
            || self.shutter.is_moving()
    }
}

/// Alpaca dome device
pub struct Dome {
    core: DeviceCore,
    caps: DomeCapabilities,
    idle_move_timeout: Option<Duration>,
    inner: Mutex<DomeInner>,
}

impl Dome {
    /// Create a dome driving `motor`
    ///
    /// # Errors
    ///
    /// Returns error if the initial sensor read fails
    pub fn new(
        name: impl Into<String>,
        mut motor: Box<dyn DomeMotor>,
        settings: DomeSettings,
    ) -> Result<Self> {
        let name = name.into();
        let now = Instant::now();
        let readings = motor.sense(now)?;
        let power = motor.power().unwrap_or(false);
        let auxiliary = motor.auxiliary().unwrap_or(false);
        let caps = motor.capabilities();
        let inner = DomeInner {
            motion: Motion::new(now),
            sensors: readings.sensors,
            shutter: readings.shutter,
            applied: Motion::new(now).drive(),
            log: StateLog::new(name.clone()),
            altitude: 0.0,
            slaved: false,
            power,
            auxiliary,
            last_move_command: now,
            last_idle_check: now,
            remote: None,
            fault: None,
            motor,
        };
        Ok(Self {
            core: DeviceCore::new(DeviceType::Dome, name).with_watchdog(settings.watchdog),
            caps,
            idle_move_timeout: settings.idle_move_timeout,
            inner: Mutex::new(inner),
        })
    }

    /// Simulated dome
    ///
    /// # Errors
    ///
    /// Returns error if the simulator cannot be read
    pub fn simulated(name: impl Into<String>, settings: DomeSettings) -> Result<Self> {
        let motor = if settings.remote_shutter {
            SimDomeMotor::new().without_shutter()
        } else {
            SimDomeMotor::new()
        };
        Self::new(name, Box::new(motor), settings)
    }

    /// Current rotation state
    #[must_use]
    pub fn state(&self) -> DomeState {
        lock(&self.inner).motion.state()
    }

    /// Shutter peer found by discovery
    #[must_use]
    pub fn shutter_peer(&self) -> Option<DiscoveredDevice> {
        lock(&self.inner).remote.as_ref().map(|r| r.peer().clone())
    }

    /// Peer that drives the shutter; only used when the dome has none
    fn remote_of<'a>(&self, inner: &'a DomeInner) -> Option<&'a Arc<RemoteShutter>> {
        inner.remote.as_ref().filter(|_| !self.caps.can_set_shutter)
    }

    fn remote_shutter(&self) -> Option<Arc<RemoteShutter>> {
        let inner = lock(&self.inner);
        self.remote_of(&inner).cloned()
    }

    fn can_set_shutter(&self, inner: &DomeInner) -> bool {
        self.caps.can_set_shutter || inner.remote.is_some()
    }

    fn shutter_status(&self, inner: &DomeInner) -> Result<ShutterStatus> {
        match self.remote_of(inner) {
            Some(remote) => remote.status().ok_or_else(|| {
                Error::alpaca(
                    AlpacaStatus::ValueNotSet,
                    "Remote shutter status has not been read yet",
                )
            }),
            None => Ok(inner.shutter),
        }
    }

    /// Forward a shutter command to the peer without holding the dome lock
    fn forward_shutter(&self, remote: &RemoteShutter, command: ShutterCommand) -> Result<()> {
        if command == ShutterCommand::Abort {
            let now = Instant::now();
            let mut inner = lock(&self.inner);
            inner.motion.stop(Stop::Now, now);
            inner.apply(now);
        }
        remote.command(command)?;
        if command != ShutterCommand::Abort {
            lock(&self.inner).last_move_command = Instant::now();
        }
        tracing::info!(
            device = %self.core.name(),
            peer = %remote.addr(),
            command = command.keyword(),
            "shutter command forwarded"
        );
        Ok(())
    }

    /// Close the shutter on behalf of a watchdog
    fn close_unattended(&self, inner: &mut DomeInner, now: Instant) {
        if let Some(remote) = self.remote_of(inner).cloned() {
            inner.last_move_command = now;
            remote.spawn_command(ShutterCommand::Close);
            return;
        }
        if let Err(e) = inner.close_shutter(now) {
            tracing::warn!(device = %self.core.name(), error = %e, "failed to close shutter");
        }
    }

    /// Advance the state machine at `now`
    pub fn step(&self, now: Instant) -> Duration {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        match inner.motor.sense(now) {
            Ok(readings) => {
                inner.sensors = readings.sensors;
                inner.shutter = readings.shutter;
            }
            Err(e) => inner.fail(&e, now),
        }
        if let Some(remote) = self.remote_of(inner).cloned() {
            let moving = remote.status().is_some_and(ShutterStatus::is_moving);
            remote.refresh(now, moving);
            if let Some(status) = remote.status() {
                inner.shutter = status;
            }
            if let Some(altitude) = remote.altitude() {
                inner.altitude = altitude;
            }
        }
        let delay = inner.motion.step(inner.sensors, now);
        inner.apply(now);
        inner.log.observe(inner.motion.state());

        self.check_idle_moves(inner, now);
        delay
    }

    fn check_idle_moves(&self, inner: &mut DomeInner, now: Instant) {
        let Some(timeout) = self.idle_move_timeout else {
            return;
        };
        if now.saturating_duration_since(inner.last_idle_check) < IDLE_CHECK_INTERVAL {
            return;
        }
        inner.last_idle_check = now;

        let idle = now.saturating_duration_since(inner.last_move_command);
        let parked = inner.sensors.at_park;
        let closed = inner.shutter == ShutterStatus::Closed;
        if idle < timeout || (parked && closed) {
            return;
        }
        tracing::warn!(
            device = %self.core.name(),
            idle_secs = idle.as_secs(),
            "no move command for too long, shutting down dome"
        );
        if !parked && self.caps.can_park {
            inner.park(now);
        }
        if !closed && !inner.shutter.is_moving() {
            self.close_unattended(inner, now);
        }
    }

    fn require(capability: bool, what: &str) -> Result<()> {
        if capability {
            Ok(())
        } else {
            unsupported(what)
        }
    }

    fn azimuth_param(req: &Request) -> Result<f64> {
        let azimuth = req.params.f64("Azimuth")?;
        if (0.0..=360.0).contains(&azimuth) {
            Ok(azimuth)
        } else {
            Err(Error::invalid_value(format!(
                "Azimuth {azimuth} is out of range 0 to 360"
            )))
        }
    }

    fn write_readall(&self, inner: &DomeInner, out: &mut JsonEncoder<'_>) -> Result<()> {
        for item in inner.state_items() {
            out.add_field(&item, true)?;
        }
        let caps = [
            ("CanFindHome", self.caps.can_find_home),
            ("CanPark", self.caps.can_park),
            ("CanSetAltitude", self.caps.can_set_altitude),
            ("CanSetAzimuth", self.caps.can_set_azimuth),
            ("CanSetPark", self.caps.can_set_park),
            ("CanSetShutter", self.can_set_shutter(inner)),
            ("CanSlave", self.caps.can_slave),
            ("CanSyncAzimuth", self.caps.can_sync_azimuth),
        ];
        for (name, value) in caps {
            out.add_bool(name, value, true)?;
        }
        out.add_bool("Slaved", inner.slaved, true)?;
        out.add_string("PowerStatus", on_off(inner.power), true)?;
        out.add_string("AuxiliaryStatus", on_off(inner.auxiliary), true)?;
        out.add_i32("SlewingRate", i32::from(inner.motion.speed()), true)?;
        out.add_string("CurrentState", &inner.motion.state().to_string(), true)?;
        out.add_bool("IdleTimeoutEnabled", self.idle_move_timeout.is_some(), true)?;
        let minutes = self.idle_move_timeout.map_or(0, |t| t.as_secs() / 60);
        out.add_u32(
            "IdleTimeoutMinutes",
            u32::try_from(minutes).unwrap_or(u32::MAX),
            true,
        )?;
        let peer = inner.remote.as_ref().map_or_else(String::new, |r| {
            format!("{}/{}", r.addr(), r.peer().device_number)
        });
        out.add_string("ShutterPeer", &peer, true)?;
        out.add_string("Fault", inner.fault.as_deref().unwrap_or_default(), true)?;
        Ok(())
    }
}

const fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

impl Device for Dome {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn commands(&self) -> &'static CommandTable {
        &cmd::TABLE
    }

    #[allow(clippy::too_many_lines)]
    fn handle_command(
        &self,
        entry: &CommandEntry,
        req: &Request,
        out: &mut JsonEncoder<'_>,
    ) -> Result<()> {
        let forwarded = match entry.id {
            cmd::OPEN_SHUTTER => Some(ShutterCommand::Open),
            cmd::CLOSE_SHUTTER => Some(ShutterCommand::Close),
            cmd::ABORT_SLEW => Some(ShutterCommand::Abort),
            _ => None,
        };
        if let Some((command, remote)) =
            forwarded.and_then(|c| self.remote_shutter().map(|r| (c, r)))
        {
            return self.forward_shutter(&remote, command);
        }

        let now = Instant::now();
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        match entry.id {
            cmd::ALTITUDE => {
                out.add_f64(VALUE, inner.altitude, true)?;
            }
            cmd::AT_HOME => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.sensors.at_home, true)?;
            }
            cmd::AT_PARK => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.sensors.at_park, true)?;
            }
            cmd::AZIMUTH => {
                inner.check_fault()?;
                out.add_f64(VALUE, inner.sensors.azimuth, true)?;
            }
            cmd::CAN_FIND_HOME => {
                out.add_bool(VALUE, self.caps.can_find_home, true)?;
            }
            cmd::CAN_PARK => {
                out.add_bool(VALUE, self.caps.can_park, true)?;
            }
            cmd::CAN_SET_ALTITUDE => {
                out.add_bool(VALUE, self.caps.can_set_altitude, true)?;
            }
            cmd::CAN_SET_AZIMUTH => {
                out.add_bool(VALUE, self.caps.can_set_azimuth, true)?;
            }
            cmd::CAN_SET_PARK => {
                out.add_bool(VALUE, self.caps.can_set_park, true)?;
            }
            cmd::CAN_SET_SHUTTER => {
                out.add_bool(VALUE, self.can_set_shutter(inner), true)?;
            }
            cmd::CAN_SLAVE => {
                out.add_bool(VALUE, self.caps.can_slave, true)?;
            }
            cmd::CAN_SYNC_AZIMUTH => {
                out.add_bool(VALUE, self.caps.can_sync_azimuth, true)?;
            }
            cmd::SHUTTER_STATUS => {
                inner.check_fault()?;
                out.add_i32(VALUE, self.shutter_status(inner)?.code(), true)?;
            }
            cmd::SLAVED => match req.verb {
                Verb::Get => {
                    out.add_bool(VALUE, inner.slaved, true)?;
                }
                Verb::Put => {
                    let slaved = req.params.bool("Slaved")?;
                    if slaved {
                        Self::require(self.caps.can_slave, "Slaving")?;
                    }
                    inner.slaved = slaved;
                }
            },
            cmd::SLEWING => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.is_moving(), true)?;
            }
            cmd::ABORT_SLEW => {
                inner.motion.stop(Stop::Now, now);
                inner.apply(now);
                if inner.shutter.is_moving() {
                    inner.motor.stop_shutter()?;
                }
                tracing::info!(device = %self.core.name(), "slew aborted");
            }
            cmd::CLOSE_SHUTTER => {
                Self::require(self.caps.can_set_shutter, "Shutter control")?;
                inner.close_shutter(now)?;
            }
            cmd::OPEN_SHUTTER => {
                Self::require(self.caps.can_set_shutter, "Shutter control")?;
                inner.open_shutter(now)?;
            }
            cmd::FIND_HOME => {
                Self::require(self.caps.can_find_home, "FindHome")?;
                inner.find_home(now);
            }
            cmd::PARK => {
                Self::require(self.caps.can_park, "Park")?;
                inner.park(now);
            }
            cmd::SET_PARK => {
                Self::require(self.caps.can_set_park, "Set park")?;
                let azimuth = inner.sensors.azimuth;
                inner.motor.set_park(azimuth)?;
                tracing::info!(device = %self.core.name(), azimuth, "park position set");
            }
            cmd::SLEW_TO_ALTITUDE => {
                Self::require(self.caps.can_set_altitude, "SlewToAltitude")?;
                let altitude = req.params.f64("Altitude")?;
                if !(0.0..=90.0).contains(&altitude) {
                    return Err(Error::invalid_value(format!(
                        "Altitude {altitude} is out of range 0 to 90"
                    )));
                }
                inner.altitude = altitude;
            }
            cmd::SLEW_TO_AZIMUTH => {
                Self::require(self.caps.can_set_azimuth, "SlewToAzimuth")?;
                let target = Self::azimuth_param(req)?;
                inner.last_move_command = now;
                if let Some(direction) = state::slew_direction(inner.sensors.azimuth, target) {
                    tracing::info!(device = %self.core.name(), target, ?direction, "slewing");
                    inner.start(direction, Goal::Azimuth(target), now);
                }
            }
            cmd::SYNC_TO_AZIMUTH => {
                Self::require(self.caps.can_sync_azimuth, "SyncToAzimuth")?;
                let azimuth = Self::azimuth_param(req)?;
                inner.last_move_command = now;
                inner.motor.sync_azimuth(azimuth)?;
                inner.sensors.azimuth = azimuth;
            }
            cmd::POWER_ON | cmd::POWER_OFF => {
                let on = entry.id == cmd::POWER_ON;
                inner.motor.set_power(on)?;
                inner.power = on;
            }
            cmd::POWER_STATUS => {
                inner.power = inner.motor.power()?;
                out.add_string(VALUE, on_off(inner.power), true)?;
            }
            cmd::AUXILIARY_ON | cmd::AUXILIARY_OFF => {
                let on = entry.id == cmd::AUXILIARY_ON;
                inner.motor.set_auxiliary(on)?;
                inner.auxiliary = on;
            }
            cmd::AUXILIARY_STATUS => {
                inner.auxiliary = inner.motor.auxiliary()?;
                out.add_string(VALUE, on_off(inner.auxiliary), true)?;
            }
            cmd::GO_LEFT => {
                inner.manual(Direction::Ccw, Goal::Manual, false, now);
            }
            cmd::GO_RIGHT => {
                inner.manual(Direction::Cw, Goal::Manual, false, now);
            }
            cmd::BUMP_LEFT => {
                inner.manual(Direction::Ccw, Goal::Bump, true, now);
            }
            cmd::BUMP_RIGHT => {
                inner.manual(Direction::Cw, Goal::Bump, true, now);
            }
            cmd::SLOW_LEFT => {
                inner.manual(Direction::Ccw, Goal::Manual, true, now);
            }
            cmd::SLOW_RIGHT => {
                inner.manual(Direction::Cw, Goal::Manual, true, now);
            }
            cmd::CURRENT_STATE => {
                out.add_string("CurrentState", &inner.motion.state().to_string(), true)?;
            }
            cmd::READ_ALL => {
                self.write_readall(inner, out)?;
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

    fn wants_discovery(&self) -> bool {
        true
    }

    fn process_discovery(&self, peer: &DiscoveredDevice) {
        if !peer.device_type.eq_ignore_ascii_case("shutter") {
            return;
        }
        tracing::info!(
            device = %self.core.name(),
            address = %peer.address,
            port = peer.port,
            number = peer.device_number,
            "found shutter"
        );
        let mut inner = lock(&self.inner);
        if inner.remote.is_some() {
            return;
        }
        match RemoteShutter::new(peer.clone()) {
            Ok(remote) => inner.remote = Some(Arc::new(remote)),
            Err(e) => {
                tracing::warn!(device = %self.core.name(), error = %e, "shutter peer unusable");
            }
        }
    }

    fn device_state(&self) -> Vec<StateItem> {
        lock(&self.inner).state_items()
    }

    fn watchdog_timeout(&self) {
        let mut inner = lock(&self.inner);
        if inner.shutter == ShutterStatus::Closed {
            return;
        }
        tracing::warn!(device = %self.core.name(), "watchdog closing shutter");
        self.close_unattended(&mut inner, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::devices::testing::{get, put};

    /// Simulator whose sensor read fails while `failing` is set
    struct FlakyMotor {
        sim: SimDomeMotor,
        failing: Arc<AtomicBool>,
    }

    impl DomeMotor for FlakyMotor {
        fn capabilities(&self) -> DomeCapabilities {
            self.sim.capabilities()
        }

        fn park_azimuth(&self) -> f64 {
            self.sim.park_azimuth()
        }

        fn home_azimuth(&self) -> f64 {
            self.sim.home_azimuth()
        }

        fn sense(&mut self, now: Instant) -> Result<DomeReadings> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Hardware("encoder lost".to_string()));
            }
            self.sim.sense(now)
        }

        fn drive(&mut self, drive: Drive, now: Instant) -> Result<()> {
            self.sim.drive(drive, now)
        }

        fn sync_azimuth(&mut self, azimuth: f64) -> Result<()> {
            self.sim.sync_azimuth(azimuth)
        }

        fn open_shutter(&mut self) -> Result<()> {
            self.sim.open_shutter()
        }

        fn close_shutter(&mut self) -> Result<()> {
            self.sim.close_shutter()
        }

        fn stop_shutter(&mut self) -> Result<()> {
            self.sim.stop_shutter()
        }
    }

    fn dome_at(azimuth: f64) -> Dome {
        Dome::new(
            "dome",
            Box::new(SimDomeMotor::new().at(azimuth)),
            DomeSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn capability_flags_are_all_true() {
        let dome = dome_at(170.0);
        for flag in ["canfindhome", "canpark", "cansetazimuth", "cansyncazimuth"] {
            assert_eq!(get(&dome, flag)["Value"], true, "{flag}");
        }
        assert_eq!(get(&dome, "atpark")["Value"], true);
        assert_eq!(get(&dome, "shutterstatus")["Value"], 1);
    }

    #[test]
    fn slew_out_of_range_is_rejected_without_moving() {
        let dome = dome_at(100.0);
        let body = put(&dome, "slewtoazimuth", "Azimuth=370");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
        assert!(!body["ErrorMessage"].as_str().unwrap().is_empty());
        assert_eq!(dome.state(), DomeState::Idle);
        assert_eq!(get(&dome, "slewing")["Value"], false);
    }

    #[test]
    fn slew_starts_in_the_shorter_direction() {
        let dome = dome_at(100.0);
        assert_eq!(put(&dome, "slewtoazimuth", "Azimuth=150")["ErrorNumber"], 0);
        assert_eq!(dome.state(), DomeState::SpeedingUp);
        assert_eq!(lock(&dome.inner).motion.direction(), Direction::Cw);
        assert_eq!(get(&dome, "slewing")["Value"], true);

        let dome = dome_at(100.0);
        put(&dome, "slewtoazimuth", "Azimuth=50");
        assert_eq!(lock(&dome.inner).motion.direction(), Direction::Ccw);
    }

    #[test]
    fn tiny_slew_does_not_move() {
        let dome = dome_at(100.0);
        assert_eq!(put(&dome, "slewtoazimuth", "Azimuth=100.5")["ErrorNumber"], 0);
        assert_eq!(dome.state(), DomeState::Idle);
    }

    #[test]
    fn slew_reaches_target_in_simulation() {
        let dome = dome_at(100.0);
        put(&dome, "slewtoazimuth", "Azimuth=110");
        let start = Instant::now();
        let mut now = start;
        while dome.state() != DomeState::Idle && now - start < Duration::from_secs(60) {
            now += Duration::from_millis(5);
            dome.step(now);
        }
        assert_eq!(dome.state(), DomeState::Idle);
        let azimuth = get(&dome, "azimuth")["Value"].as_f64().unwrap();
        assert!((azimuth - 110.0).abs() < 1.0, "stopped at {azimuth}");
    }

    #[test]
    fn park_from_the_east_turns_counter_clockwise() {
        let dome = dome_at(200.0);
        put(&dome, "park", "");
        assert_eq!(lock(&dome.inner).motion.direction(), Direction::Ccw);
        assert_eq!(lock(&dome.inner).motion.goal(), Goal::Park);
    }

    #[test]
    fn park_when_parked_is_a_no_op() {
        let dome = dome_at(170.0);
        assert_eq!(put(&dome, "park", "")["ErrorNumber"], 0);
        assert_eq!(dome.state(), DomeState::Idle);
    }

    #[test]
    fn abort_stops_immediately() {
        let dome = dome_at(100.0);
        put(&dome, "goright", "");
        assert_eq!(dome.state(), DomeState::SpeedingUp);
        put(&dome, "abortslew", "");
        assert_eq!(dome.state(), DomeState::Stopped);
        assert_eq!(lock(&dome.inner).applied.speed, 0);
    }

    #[test]
    fn manual_move_is_ignored_while_turning() {
        let dome = dome_at(100.0);
        put(&dome, "bumpleft", "");
        assert_eq!(dome.state(), DomeState::Moving);
        assert_eq!(put(&dome, "goright", "")["ErrorNumber"], 0);
        assert_eq!(lock(&dome.inner).motion.direction(), Direction::Ccw);
        assert_eq!(lock(&dome.inner).motion.goal(), Goal::Bump);
    }

    #[test]
    fn shutter_opens_then_watchdog_closes_it() {
        let dome = dome_at(170.0);
        put(&dome, "openshutter", "");
        assert_eq!(get(&dome, "shutterstatus")["Value"], 2);
        dome.step(Instant::now() + Duration::from_secs(11));
        assert_eq!(get(&dome, "shutterstatus")["Value"], 0);

        dome.watchdog_timeout();
        assert_eq!(get(&dome, "shutterstatus")["Value"], 3);
    }

    #[test]
    fn idle_move_watchdog_parks_and_closes() {
        let dome = Dome::new(
            "dome",
            Box::new(SimDomeMotor::new().at(120.0)),
            DomeSettings {
                idle_move_timeout: Some(Duration::from_secs(60)),
                ..DomeSettings::default()
            },
        )
        .unwrap();
        put(&dome, "openshutter", "");
        let now = Instant::now();
        dome.step(now + Duration::from_secs(11));
        assert_eq!(dome.state(), DomeState::Idle);

        dome.step(now + Duration::from_secs(75));
        let inner = lock(&dome.inner);
        assert_eq!(inner.motion.goal(), Goal::Park);
        assert_eq!(inner.shutter, ShutterStatus::Closing);
    }

    #[test]
    fn records_shutter_peer_from_discovery() {
        let dome = dome_at(170.0);
        let peer = |kind: &str| DiscoveredDevice {
            address: "10.0.0.7".parse().unwrap(),
            port: 6800,
            device_type: kind.to_string(),
            device_number: 0,
            device_name: "roof".to_string(),
            unique_id: String::new(),
        };
        dome.process_discovery(&peer("Camera"));
        assert!(dome.shutter_peer().is_none());
        dome.process_discovery(&peer("Shutter"));
        assert_eq!(dome.shutter_peer().unwrap().address.to_string(), "10.0.0.7");
    }

    #[test]
    fn shutterless_dome_needs_a_peer() {
        let dome = Dome::simulated(
            "dome",
            DomeSettings {
                remote_shutter: true,
                ..DomeSettings::default()
            },
        )
        .unwrap();
        assert_eq!(get(&dome, "cansetshutter")["Value"], false);
        assert_eq!(
            put(&dome, "openshutter", "")["ErrorNumber"],
            AlpacaStatus::MethodNotImplemented.code()
        );

        dome.process_discovery(&DiscoveredDevice {
            address: "127.0.0.1".parse().unwrap(),
            port: 9,
            device_type: "Shutter".to_string(),
            device_number: 0,
            device_name: "roof".to_string(),
            unique_id: String::new(),
        });
        assert_eq!(get(&dome, "cansetshutter")["Value"], true);
        assert_eq!(get(&dome, "readall")["CanSetShutter"], true);
        assert_eq!(
            get(&dome, "shutterstatus")["ErrorNumber"],
            AlpacaStatus::ValueNotSet.code()
        );
        // no runtime here, so the peer cannot be reached
        assert_eq!(
            put(&dome, "closeshutter", "")["ErrorNumber"],
            AlpacaStatus::NotConnected.code()
        );
        dome.step(Instant::now());
        assert_eq!(dome.state(), DomeState::Idle);
    }

    #[test]
    fn sensor_fault_is_reported_until_the_next_move() {
        let failing = Arc::new(AtomicBool::new(false));
        let motor = FlakyMotor {
            sim: SimDomeMotor::new().at(100.0),
            failing: Arc::clone(&failing),
        };
        let dome = Dome::new("dome", Box::new(motor), DomeSettings::default()).unwrap();
        failing.store(true, Ordering::SeqCst);
        dome.step(Instant::now());
        failing.store(false, Ordering::SeqCst);

        for query in ["slewing", "azimuth", "athome", "atpark", "shutterstatus"] {
            let body = get(&dome, query);
            assert_eq!(
                body["ErrorNumber"],
                AlpacaStatus::UnspecifiedError.code(),
                "{query}"
            );
            assert!(body["ErrorMessage"].as_str().unwrap().contains("encoder lost"));
        }
        let body = get(&dome, "readall");
        assert_eq!(body["ErrorNumber"], 0);
        assert!(body["Fault"].as_str().unwrap().contains("encoder lost"));

        // a sensor read that works again does not clear the fault by itself
        dome.step(Instant::now());
        assert_eq!(
            get(&dome, "azimuth")["ErrorNumber"],
            AlpacaStatus::UnspecifiedError.code()
        );

        assert_eq!(put(&dome, "slewtoazimuth", "Azimuth=150")["ErrorNumber"], 0);
        let body = get(&dome, "slewing");
        assert_eq!(body["ErrorNumber"], 0);
        assert_eq!(body["Value"], true);
        assert_eq!(get(&dome, "readall")["Fault"], "");
    }

    #[test]
    fn readall_reports_every_property() {
        let dome = dome_at(170.0);
        let body = get(&dome, "readall");
        assert_eq!(body["AtPark"], true);
        assert_eq!(body["CanSetShutter"], true);
        assert_eq!(body["PowerStatus"], "ON");
        assert_eq!(body["CurrentState"], "Idle");
        assert_eq!(body["ErrorNumber"], 0);
    }

    #[test]
    fn extras_separator_is_not_routable() {
        let dome = dome_at(170.0);
        let body = get(&dome, "--extras");
        assert_eq!(body["ErrorNumber"], 0x400);
        assert_eq!(body["ErrorMessage"], "'--extras' is not a recognized command");
        assert_eq!(get(&dome, "powerstatus")["ErrorNumber"], 0);
    }

    #[test]
    fn power_extras_toggle() {
        let dome = dome_at(170.0);
        put(&dome, "poweroff", "");
        assert_eq!(get(&dome, "powerstatus")["Value"], "OFF");
        put(&dome, "auxiliaryon", "");
        assert_eq!(get(&dome, "auxiliarystatus")["Value"], "ON");
    }
}
