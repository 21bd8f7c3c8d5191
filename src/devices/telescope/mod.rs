//! Equatorial telescope mount

pub mod astro;
pub mod commands;
pub mod sim;

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

pub use astro::Equatorial;
pub use sim::SimMountDrive;

use self::commands as cmd;
use super::lock;
use crate::device::{DEFAULT_WATCHDOG, Device, DeviceCore};
use crate::protocol::{AlpacaStatus, CommandEntry, CommandTable, DeviceType, VALUE, Verb};
use crate::request::Request;
use crate::scheduler::StateLog;
use crate::wire::{JsonEncoder, StateItem};
use crate::{Error, Result};

const MOVING_POLL: Duration = Duration::from_millis(10);
const IDLE_POLL: Duration = Duration::from_secs(1);

/// German equatorial alignment mode code
const ALIGNMENT_GERMAN_POLAR: i32 = 2;
/// Sidereal drive rate code
const DRIVE_SIDEREAL: i32 = 0;

/// What the mount hardware supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MountCapabilities {
    pub can_find_home: bool,
    pub can_park: bool,
    pub can_set_tracking: bool,
    pub can_sync: bool,
}

impl MountCapabilities {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            can_find_home: true,
            can_park: true,
            can_set_tracking: true,
            can_sync: true,
        }
    }
}

/// Hardware behind a telescope mount
pub trait MountDrive: Send {
    fn capabilities(&self) -> MountCapabilities;

    /// Current pointing
    ///
    /// # Errors
    ///
    /// Returns error if the encoders cannot be read
    fn position(&mut self, now: Instant) -> Result<Equatorial>;

    /// Start slewing to `target`
    ///
    /// # Errors
    ///
    /// Returns error if the slew cannot be started
    fn slew_to(&mut self, target: Equatorial, now: Instant) -> Result<()>;

    /// Start moving to the park position
    ///
    /// # Errors
    ///
    /// Returns error if the move cannot be started
    fn park(&mut self, now: Instant) -> Result<()>;

    /// Start moving to the home position
    ///
    /// # Errors
    ///
    /// Returns error if the move cannot be started
    fn find_home(&mut self, now: Instant) -> Result<()>;

    /// Whether any axis is still moving
    ///
    /// # Errors
    ///
    /// Returns error if the mount cannot be queried
    fn is_moving(&mut self, now: Instant) -> Result<bool>;

    /// # Errors
    ///
    /// Returns error if the axes cannot be stopped
    fn abort(&mut self, now: Instant) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the position cannot be set
    fn sync(&mut self, position: Equatorial) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the drive cannot be switched
    fn set_tracking(&mut self, on: bool) -> Result<()>;
}

/// Mount motion state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Idle,
    Slewing,
    Parking,
    Homing,
}

impl MountState {
    #[must_use]
    pub const fn is_moving(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Slewing => "Slewing",
            Self::Parking => "Parking",
            Self::Homing => "Homing",
        };
        f.write_str(name)
    }
}

/// Where a finished move left the mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Target,
    Park,
    Home,
}

/// Next state given whether the mount still reports motion
#[must_use]
pub const fn settle(state: MountState, moving: bool) -> (MountState, Option<Arrival>) {
    if moving {
        return (state, None);
    }
    let arrival = match state {
        MountState::Idle => None,
        MountState::Slewing => Some(Arrival::Target),
        MountState::Parking => Some(Arrival::Park),
        MountState::Homing => Some(Arrival::Home),
    };
    (MountState::Idle, arrival)
}

/// Observing site, validated on every change
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level
    pub elevation: f64,
}

/// Telescope tuning
#[derive(Debug, Clone, Copy)]
pub struct TelescopeSettings {
    pub site: Site,
    /// Command watchdog; stops tracking
    pub watchdog: Duration,
}

impl Default for TelescopeSettings {
    fn default() -> Self {
        Self {
            site: Site::default(),
            watchdog: DEFAULT_WATCHDOG,
        }
    }
}

struct TelescopeInner {
    mount: Box<dyn MountDrive>,
    state: MountState,
    position: Equatorial,
    target_ra: Option<f64>,
    target_dec: Option<f64>,
    tracking: bool,
    parked: bool,
    at_home: bool,
    site: Site,
    log: StateLog<MountState>,
    fault: Option<String>,
}

impl TelescopeInner {
    fn fail(&mut self, e: &Error, now: Instant) {
        tracing::warn!(error = %e, "mount hardware failure, stopping");
        if let Err(e) = self.mount.abort(now) {
            tracing::warn!(error = %e, "failed to stop mount");
        }
        self.state = MountState::Idle;
        self.fault = Some(e.to_string());
    }

    fn check_unparked(&self) -> Result<()> {
        if self.parked {
            Err(Error::alpaca(
                AlpacaStatus::InvalidWhileParked,
                "Invalid while parked",
            ))
        } else {
            Ok(())
        }
    }

    /// Position and motion are unreliable until a move succeeds after a failure
    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(fault) => Err(Error::Hardware(fault.clone())),
            None => Ok(()),
        }
    }

    fn slew(&mut self, target: Equatorial, now: Instant) -> Result<()> {
        self.check_unparked()?;
        self.mount.slew_to(target, now)?;
        self.state = MountState::Slewing;
        self.at_home = false;
        self.fault = None;
        Ok(())
    }

    fn target(&self) -> Result<Equatorial> {
        match (self.target_ra, self.target_dec) {
            (Some(ra), Some(dec)) => Ok(Equatorial::new(ra, dec)),
            _ => Err(Error::invalid_operation("Target coordinates not set")),
        }
    }

    fn sidereal_time(&self) -> f64 {
        astro::local_sidereal_time(Utc::now(), self.site.longitude)
    }

    fn state_items(&self) -> Vec<StateItem> {
        vec![
            StateItem::new("AtHome", self.at_home),
            StateItem::new("AtPark", self.parked),
            StateItem::new("Declination", self.position.dec),
            StateItem::new("RightAscension", self.position.ra),
            StateItem::new("SiderealTime", self.sidereal_time()),
            StateItem::new("Slewing", self.state.is_moving()),
            StateItem::new("Tracking", self.tracking),
            StateItem::new("UTCDate", utc_date()),
        ]
    }
}

fn utc_date() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn ranged(req: &Request, key: &str, min: f64, max: f64) -> Result<f64> {
    let value = req.params.f64(key)?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(Error::invalid_value(format!("{key} is out of bounds")))
    }
}

fn coordinates(req: &Request) -> Result<Equatorial> {
    let ra = req.params.f64("RightAscension")?;
    let dec = req.params.f64("Declination")?;
    if !astro::valid_ra(ra) {
        return Err(Error::invalid_value("RightAscension out of bounds"));
    }
    if !astro::valid_dec(dec) {
        return Err(Error::invalid_value("Declination out of bounds"));
    }
    Ok(Equatorial::new(ra, dec))
}

/// Alpaca telescope device
pub struct Telescope {
    core: DeviceCore,
    caps: MountCapabilities,
    inner: Mutex<TelescopeInner>,
}

impl Telescope {
    /// Create a telescope driving `mount`
    ///
    /// # Errors
    ///
    /// Returns error if the initial position cannot be read
    pub fn new(
        name: impl Into<String>,
        mut mount: Box<dyn MountDrive>,
        settings: TelescopeSettings,
    ) -> Result<Self> {
        let name = name.into();
        let position = mount.position(Instant::now())?;
        let caps = mount.capabilities();
        let inner = TelescopeInner {
            state: MountState::Idle,
            position,
            target_ra: None,
            target_dec: None,
            tracking: false,
            parked: false,
            at_home: false,
            site: settings.site,
            log: StateLog::new(name.clone()),
            fault: None,
            mount,
        };
        Ok(Self {
            core: DeviceCore::new(DeviceType::Telescope, name).with_watchdog(settings.watchdog),
            caps,
            inner: Mutex::new(inner),
        })
    }

    /// Simulated mount
    ///
    /// # Errors
    ///
    /// Returns error if the simulator cannot be read
    pub fn simulated(name: impl Into<String>, settings: TelescopeSettings) -> Result<Self> {
        Self::new(name, Box::new(SimMountDrive::new()), settings)
    }

    #[must_use]
    pub fn state(&self) -> MountState {
        lock(&self.inner).state
    }

    /// Advance the mount state machine at `now`
    pub fn step(&self, now: Instant) -> Duration {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        let sensed = inner
            .mount
            .position(now)
            .and_then(|p| inner.mount.is_moving(now).map(|moving| (p, moving)));
        match sensed {
            Ok((position, moving)) => {
                inner.position = position;
                let (next, arrival) = settle(inner.state, moving);
                inner.state = next;
                match arrival {
                    Some(Arrival::Park) => {
                        inner.parked = true;
                        inner.tracking = false;
                        tracing::info!(device = %self.core.name(), "mount parked");
                    }
                    Some(Arrival::Home) => {
                        inner.at_home = true;
                        tracing::info!(device = %self.core.name(), "mount at home");
                    }
                    Some(Arrival::Target) => {
                        tracing::info!(
                            device = %self.core.name(),
                            ra = position.ra,
                            dec = position.dec,
                            "slew complete"
                        );
                    }
                    None => {}
                }
            }
            Err(e) => inner.fail(&e, now),
        }
        inner.log.observe(inner.state);

        if inner.state.is_moving() {
            MOVING_POLL
        } else {
            IDLE_POLL
        }
    }

    fn require(capability: bool, what: &str) -> Result<()> {
        if capability {
            Ok(())
        } else {
            Err(Error::alpaca(
                AlpacaStatus::MethodNotImplemented,
                format!("{what} not supported"),
            ))
        }
    }

    fn write_readall(&self, inner: &TelescopeInner, out: &mut JsonEncoder<'_>) -> Result<()> {
        for item in inner.state_items() {
            out.add_field(&item, true)?;
        }
        out.add_bool("CanFindHome", self.caps.can_find_home, true)?;
        out.add_bool("CanPark", self.caps.can_park, true)?;
        out.add_bool("CanSetTracking", self.caps.can_set_tracking, true)?;
        out.add_bool("CanSync", self.caps.can_sync, true)?;
        out.add_f64("SiteLatitude", inner.site.latitude, true)?;
        out.add_f64("SiteLongitude", inner.site.longitude, true)?;
        out.add_f64("SiteElevation", inner.site.elevation, true)?;
        let hour_angle = astro::hour_angle(inner.sidereal_time(), inner.position.ra);
        out.add_f64("HourAngle", hour_angle, true)?;
        out.add_string("CurrentState", &inner.state.to_string(), true)?;
        out.add_string("Fault", inner.fault.as_deref().unwrap_or_default(), true)?;
        Ok(())
    }
}

impl Device for Telescope {
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
        let now = Instant::now();
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        match entry.id {
            cmd::ALIGNMENT_MODE => {
                out.add_i32(VALUE, ALIGNMENT_GERMAN_POLAR, true)?;
            }
            cmd::AT_HOME => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.at_home, true)?;
            }
            cmd::AT_PARK => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.parked, true)?;
            }
            cmd::CAN_FIND_HOME => {
                out.add_bool(VALUE, self.caps.can_find_home, true)?;
            }
            cmd::CAN_PARK | cmd::CAN_UNPARK => {
                out.add_bool(VALUE, self.caps.can_park, true)?;
            }
            cmd::CAN_PULSE_GUIDE | cmd::CAN_SLEW => {
                out.add_bool(VALUE, false, true)?;
            }
            cmd::CAN_SET_TRACKING => {
                out.add_bool(VALUE, self.caps.can_set_tracking, true)?;
            }
            cmd::CAN_SLEW_ASYNC => {
                out.add_bool(VALUE, true, true)?;
            }
            cmd::CAN_SYNC => {
                out.add_bool(VALUE, self.caps.can_sync, true)?;
            }
            cmd::DECLINATION => {
                inner.check_fault()?;
                out.add_f64(VALUE, inner.position.dec, true)?;
            }
            cmd::RIGHT_ASCENSION => {
                inner.check_fault()?;
                out.add_f64(VALUE, inner.position.ra, true)?;
            }
            cmd::SIDEREAL_TIME => {
                out.add_f64(VALUE, inner.sidereal_time(), true)?;
            }
            cmd::SITE_ELEVATION => match req.verb {
                Verb::Get => {
                    out.add_f64(VALUE, inner.site.elevation, true)?;
                }
                Verb::Put => {
                    inner.site.elevation = ranged(req, "SiteElevation", -300.0, 10_000.0)?;
                }
            },
            cmd::SITE_LATITUDE => match req.verb {
                Verb::Get => {
                    out.add_f64(VALUE, inner.site.latitude, true)?;
                }
                Verb::Put => {
                    inner.site.latitude = ranged(req, "SiteLatitude", -90.0, 90.0)?;
                }
            },
            cmd::SITE_LONGITUDE => match req.verb {
                Verb::Get => {
                    out.add_f64(VALUE, inner.site.longitude, true)?;
                }
                Verb::Put => {
                    inner.site.longitude = ranged(req, "SiteLongitude", -180.0, 180.0)?;
                }
            },
            cmd::SLEWING => {
                inner.check_fault()?;
                out.add_bool(VALUE, inner.state.is_moving(), true)?;
            }
            cmd::TARGET_DECLINATION => match req.verb {
                Verb::Get => {
                    let Some(dec) = inner.target_dec else {
                        return Err(Error::alpaca(
                            AlpacaStatus::ValueNotSet,
                            "TargetDeclination not set",
                        ));
                    };
                    out.add_f64(VALUE, dec, true)?;
                }
                Verb::Put => {
                    let dec = req.params.f64("TargetDeclination")?;
                    if !astro::valid_dec(dec) {
                        return Err(Error::invalid_value("TargetDeclination out of bounds"));
                    }
                    inner.target_dec = Some(dec);
                }
            },
            cmd::TARGET_RIGHT_ASCENSION => match req.verb {
                Verb::Get => {
                    let Some(ra) = inner.target_ra else {
                        return Err(Error::alpaca(
                            AlpacaStatus::ValueNotSet,
                            "TargetRightAscension not set",
                        ));
                    };
                    out.add_f64(VALUE, ra, true)?;
                }
                Verb::Put => {
                    let ra = req.params.f64("TargetRightAscension")?;
                    if !astro::valid_ra(ra) {
                        return Err(Error::invalid_value("TargetRightAscension out of bounds"));
                    }
                    inner.target_ra = Some(ra);
                }
            },
            cmd::TRACKING => match req.verb {
                Verb::Get => {
                    out.add_bool(VALUE, inner.tracking, true)?;
                }
                Verb::Put => {
                    Self::require(self.caps.can_set_tracking, "Tracking control")?;
                    let on = req.params.bool("Tracking")?;
                    if on {
                        inner.check_unparked()?;
                    }
                    inner.mount.set_tracking(on)?;
                    inner.tracking = on;
                }
            },
            cmd::TRACKING_RATE => {
                out.add_i32(VALUE, DRIVE_SIDEREAL, true)?;
            }
            cmd::UTC_DATE => {
                out.add_string(VALUE, &utc_date(), true)?;
            }
            cmd::ABORT_SLEW => {
                inner.check_unparked()?;
                inner.mount.abort(now)?;
                inner.state = MountState::Idle;
                tracing::info!(device = %self.core.name(), "slew aborted");
            }
            cmd::FIND_HOME => {
                Self::require(self.caps.can_find_home, "FindHome")?;
                inner.check_unparked()?;
                inner.mount.find_home(now)?;
                inner.state = MountState::Homing;
                inner.fault = None;
            }
            cmd::PARK => {
                Self::require(self.caps.can_park, "Park")?;
                if !inner.parked {
                    inner.mount.park(now)?;
                    inner.state = MountState::Parking;
                    inner.at_home = false;
                    inner.fault = None;
                }
            }
            cmd::UNPARK => {
                Self::require(self.caps.can_park, "Unpark")?;
                inner.parked = false;
            }
            cmd::PULSE_GUIDE => {
                return Err(Error::alpaca(
                    AlpacaStatus::MethodNotImplemented,
                    "PulseGuide not supported",
                ));
            }
            cmd::SLEW_TO_COORDINATES_ASYNC => {
                let target = coordinates(req)?;
                inner.check_unparked()?;
                inner.target_ra = Some(target.ra);
                inner.target_dec = Some(target.dec);
                inner.slew(target, now)?;
                tracing::info!(
                    device = %self.core.name(),
                    ra = target.ra,
                    dec = target.dec,
                    "slewing"
                );
            }
            cmd::SLEW_TO_TARGET_ASYNC => {
                inner.check_unparked()?;
                let target = inner.target()?;
                inner.slew(target, now)?;
                tracing::info!(
                    device = %self.core.name(),
                    ra = target.ra,
                    dec = target.dec,
                    "slewing"
                );
            }
            cmd::SYNC_TO_COORDINATES => {
                Self::require(self.caps.can_sync, "Sync")?;
                let position = coordinates(req)?;
                inner.check_unparked()?;
                inner.mount.sync(position)?;
                inner.position = position;
                inner.target_ra = Some(position.ra);
                inner.target_dec = Some(position.dec);
            }
            cmd::SYNC_TO_TARGET => {
                Self::require(self.caps.can_sync, "Sync")?;
                inner.check_unparked()?;
                let position = inner.target()?;
                inner.mount.sync(position)?;
                inner.position = position;
            }
            cmd::HOUR_ANGLE => {
                let hour_angle = astro::hour_angle(inner.sidereal_time(), inner.position.ra);
                out.add_f64(VALUE, hour_angle, true)?;
            }
            cmd::CURRENT_STATE => {
                out.add_string("CurrentState", &inner.state.to_string(), true)?;
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

    fn device_state(&self) -> Vec<StateItem> {
        lock(&self.inner).state_items()
    }

    fn watchdog_timeout(&self) {
        let mut inner = lock(&self.inner);
        if !inner.tracking {
            return;
        }
        tracing::warn!(device = %self.core.name(), "watchdog stopping tracking");
        match inner.mount.set_tracking(false) {
            Ok(()) => inner.tracking = false,
            Err(e) => {
                tracing::warn!(device = %self.core.name(), error = %e, "failed to stop tracking");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::devices::testing::{get, put};

    /// Simulator whose encoders fail while `failing` is set
    struct FlakyMount {
        sim: SimMountDrive,
        failing: Arc<AtomicBool>,
    }

    impl MountDrive for FlakyMount {
        fn capabilities(&self) -> MountCapabilities {
            self.sim.capabilities()
        }

        fn position(&mut self, now: Instant) -> Result<Equatorial> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Hardware("RA encoder timeout".to_string()));
            }
            self.sim.position(now)
        }

        fn slew_to(&mut self, target: Equatorial, now: Instant) -> Result<()> {
            self.sim.slew_to(target, now)
        }

        fn park(&mut self, now: Instant) -> Result<()> {
            self.sim.park(now)
        }

        fn find_home(&mut self, now: Instant) -> Result<()> {
            self.sim.find_home(now)
        }

        fn is_moving(&mut self, now: Instant) -> Result<bool> {
            self.sim.is_moving(now)
        }

        fn abort(&mut self, now: Instant) -> Result<()> {
            self.sim.abort(now)
        }

        fn sync(&mut self, position: Equatorial) -> Result<()> {
            self.sim.sync(position)
        }

        fn set_tracking(&mut self, on: bool) -> Result<()> {
            self.sim.set_tracking(on)
        }
    }

    fn scope() -> Telescope {
        Telescope::new(
            "scope",
            Box::new(SimMountDrive::at(Equatorial::new(6.0, 20.0))),
            TelescopeSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn settle_reports_arrivals() {
        assert_eq!(settle(MountState::Slewing, true), (MountState::Slewing, None));
        assert_eq!(
            settle(MountState::Parking, false),
            (MountState::Idle, Some(Arrival::Park))
        );
        assert_eq!(settle(MountState::Idle, false), (MountState::Idle, None));
    }

    #[test]
    fn site_latitude_out_of_bounds_keeps_the_old_value() {
        let scope = scope();
        assert_eq!(put(&scope, "sitelatitude", "SiteLatitude=51.3")["ErrorNumber"], 0);
        let body = put(&scope, "sitelatitude", "SiteLatitude=95");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
        assert_eq!(body["ErrorMessage"], "SiteLatitude is out of bounds");
        assert!((get(&scope, "sitelatitude")["Value"].as_f64().unwrap() - 51.3).abs() < 1e-9);
    }

    #[test]
    fn site_bounds() {
        let scope = scope();
        let code = |cmd: &str, params: &str| put(&scope, cmd, params)["ErrorNumber"].clone();
        assert_eq!(code("sitelongitude", "SiteLongitude=-180"), 0);
        assert_eq!(code("sitelongitude", "SiteLongitude=181"), AlpacaStatus::InvalidValue.code());
        assert_eq!(code("siteelevation", "SiteElevation=-300"), 0);
        assert_eq!(code("siteelevation", "SiteElevation=10001"), AlpacaStatus::InvalidValue.code());
    }

    #[test]
    fn target_coordinates_are_validated() {
        let scope = scope();
        assert_eq!(
            get(&scope, "targetrightascension")["ErrorNumber"],
            AlpacaStatus::ValueNotSet.code()
        );
        let body = put(&scope, "targetrightascension", "TargetRightAscension=24");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
        assert_eq!(put(&scope, "targetrightascension", "TargetRightAscension=23.5")["ErrorNumber"], 0);
        let body = put(&scope, "targetdeclination", "TargetDeclination=-91");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
    }

    #[test]
    fn slew_runs_until_the_mount_settles() {
        let scope = scope();
        let body = put(&scope, "slewtocoordinatesasync", "RightAscension=7&Declination=20");
        assert_eq!(body["ErrorNumber"], 0);
        assert_eq!(scope.state(), MountState::Slewing);
        assert_eq!(get(&scope, "slewing")["Value"], true);

        let now = Instant::now();
        assert_eq!(scope.step(now), MOVING_POLL);
        assert_eq!(scope.step(now + Duration::from_secs(5)), IDLE_POLL);
        assert_eq!(scope.state(), MountState::Idle);
        assert!((get(&scope, "rightascension")["Value"].as_f64().unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn slews_while_parked_are_refused() {
        let scope = scope();
        put(&scope, "park", "");
        assert_eq!(scope.state(), MountState::Parking);
        scope.step(Instant::now() + Duration::from_secs(60));
        assert_eq!(get(&scope, "atpark")["Value"], true);

        let body = put(&scope, "slewtocoordinatesasync", "RightAscension=7&Declination=20");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidWhileParked.code());
        put(&scope, "targetrightascension", "TargetRightAscension=1");
        put(&scope, "targetdeclination", "TargetDeclination=1");
        let body = put(&scope, "slewtotargetasync", "");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidWhileParked.code());

        put(&scope, "unpark", "");
        assert_eq!(put(&scope, "slewtotargetasync", "")["ErrorNumber"], 0);
    }

    #[test]
    fn slew_to_target_needs_a_target() {
        let scope = scope();
        let body = put(&scope, "slewtotargetasync", "");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidOperation.code());
    }

    #[test]
    fn sync_moves_the_reported_position() {
        let scope = scope();
        put(&scope, "synctocoordinates", "RightAscension=3&Declination=-10");
        assert!((get(&scope, "declination")["Value"].as_f64().unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn watchdog_stops_tracking() {
        let scope = scope();
        put(&scope, "tracking", "Tracking=true");
        assert_eq!(get(&scope, "tracking")["Value"], true);
        scope.watchdog_timeout();
        assert_eq!(get(&scope, "tracking")["Value"], false);
    }

    #[test]
    fn encoder_fault_is_reported_until_the_next_slew() {
        let failing = Arc::new(AtomicBool::new(false));
        let mount = FlakyMount {
            sim: SimMountDrive::at(Equatorial::new(6.0, 20.0)),
            failing: Arc::clone(&failing),
        };
        let scope = Telescope::new("scope", Box::new(mount), TelescopeSettings::default()).unwrap();
        put(&scope, "slewtocoordinatesasync", "RightAscension=7&Declination=20");
        failing.store(true, Ordering::SeqCst);
        scope.step(Instant::now());
        failing.store(false, Ordering::SeqCst);
        assert_eq!(scope.state(), MountState::Idle);

        for query in ["slewing", "rightascension", "declination", "atpark", "athome"] {
            let body = get(&scope, query);
            assert_eq!(
                body["ErrorNumber"],
                AlpacaStatus::UnspecifiedError.code(),
                "{query}"
            );
            assert!(body["ErrorMessage"].as_str().unwrap().contains("RA encoder timeout"));
        }
        let fault = get(&scope, "readall")["Fault"].clone();
        assert!(fault.as_str().unwrap().contains("RA encoder timeout"));

        let body = put(&scope, "slewtocoordinatesasync", "RightAscension=8&Declination=20");
        assert_eq!(body["ErrorNumber"], 0);
        let body = get(&scope, "slewing");
        assert_eq!(body["ErrorNumber"], 0);
        assert_eq!(body["Value"], true);
    }

    #[test]
    fn find_home_reaches_home() {
        let scope = scope();
        put(&scope, "findhome", "");
        assert_eq!(scope.state(), MountState::Homing);
        scope.step(Instant::now() + Duration::from_secs(60));
        assert_eq!(get(&scope, "athome")["Value"], true);
        assert_eq!(get(&scope, "readall")["CurrentState"], "Idle");
    }
}
