//! Simulated dome rotation and shutter

use std::time::{Duration, Instant};

use super::state::{Direction, Drive, MAX_SPEED, Sensors};
use super::{DomeCapabilities, DomeMotor, DomeReadings, unsupported};
use crate::Result;
use crate::devices::ShutterStatus;

/// Seconds for one revolution at full power
const REVOLUTION_SECS: f64 = 144.0;
/// Half width of the home and park sensor windows
const SENSOR_WINDOW: f64 = 0.5;
const SHUTTER_TRAVEL: Duration = Duration::from_secs(10);

/// Shortest angular distance between two azimuths
fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Dome motor that integrates its azimuth from the commanded power
#[derive(Debug)]
pub struct SimDomeMotor {
    azimuth: f64,
    drive: Drive,
    last_update: Option<Instant>,
    park: f64,
    home: f64,
    shutter: ShutterStatus,
    shutter_move: Option<(ShutterStatus, Instant)>,
    power: bool,
    auxiliary: bool,
    has_shutter: bool,
}

impl SimDomeMotor {
    /// Simulator parked at 170 degrees with home at 230 degrees
    #[must_use]
    pub const fn new() -> Self {
        Self {
            azimuth: 170.0,
            drive: Drive {
                direction: Direction::Cw,
                speed: 0,
            },
            last_update: None,
            park: 170.0,
            home: 230.0,
            shutter: ShutterStatus::Closed,
            shutter_move: None,
            power: true,
            auxiliary: false,
            has_shutter: true,
        }
    }

    /// Dome whose shutter is driven by a separate controller
    #[must_use]
    pub const fn without_shutter(mut self) -> Self {
        self.has_shutter = false;
        self
    }

    /// Place the dome at `azimuth` without moving through the sensors
    #[must_use]
    pub fn at(mut self, azimuth: f64) -> Self {
        self.azimuth = azimuth;
        self
    }

    fn advance(&mut self, now: Instant) {
        let elapsed = self
            .last_update
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        self.last_update = Some(now);
        if self.drive.speed == 0 {
            return;
        }
        let fraction = f64::from(self.drive.speed) / f64::from(MAX_SPEED);
        let degrees = fraction * elapsed.as_secs_f64() * 360.0 / REVOLUTION_SECS;
        let moved = match self.drive.direction {
            Direction::Cw => self.azimuth + degrees,
            Direction::Ccw => self.azimuth - degrees,
        };
        self.azimuth = moved.rem_euclid(360.0);
    }

    fn start_shutter(&mut self, toward: ShutterStatus) {
        let (done, moving) = match toward {
            ShutterStatus::Open => (ShutterStatus::Open, ShutterStatus::Opening),
            _ => (ShutterStatus::Closed, ShutterStatus::Closing),
        };
        if self.shutter != done {
            self.shutter = moving;
            self.shutter_move = Some((done, Instant::now()));
        }
    }
}

impl Default for SimDomeMotor {
    fn default() -> Self {
        Self::new()
    }
}

impl DomeMotor for SimDomeMotor {
    fn capabilities(&self) -> DomeCapabilities {
        DomeCapabilities {
            can_set_shutter: self.has_shutter,
            ..DomeCapabilities::all()
        }
    }

    fn park_azimuth(&self) -> f64 {
        self.park
    }

    fn home_azimuth(&self) -> f64 {
        self.home
    }

    fn sense(&mut self, now: Instant) -> Result<DomeReadings> {
        self.advance(now);
        if let Some((done, started)) = self.shutter_move {
            if now.saturating_duration_since(started) >= SHUTTER_TRAVEL {
                self.shutter = done;
                self.shutter_move = None;
            }
        }
        Ok(DomeReadings {
            sensors: Sensors {
                azimuth: self.azimuth,
                at_home: angular_distance(self.azimuth, self.home) <= SENSOR_WINDOW,
                at_park: angular_distance(self.azimuth, self.park) <= SENSOR_WINDOW,
            },
            shutter: self.shutter,
        })
    }

    fn drive(&mut self, drive: Drive, now: Instant) -> Result<()> {
        self.advance(now);
        self.drive = drive;
        Ok(())
    }

    fn sync_azimuth(&mut self, azimuth: f64) -> Result<()> {
        self.azimuth = azimuth.rem_euclid(360.0);
        Ok(())
    }

    fn set_park(&mut self, azimuth: f64) -> Result<()> {
        self.park = azimuth;
        Ok(())
    }

    fn open_shutter(&mut self) -> Result<()> {
        if !self.has_shutter {
            return unsupported("Shutter control");
        }
        self.start_shutter(ShutterStatus::Open);
        Ok(())
    }

    fn close_shutter(&mut self) -> Result<()> {
        if !self.has_shutter {
            return unsupported("Shutter control");
        }
        self.start_shutter(ShutterStatus::Closed);
        Ok(())
    }

    fn stop_shutter(&mut self) -> Result<()> {
        if !self.has_shutter {
            return unsupported("Shutter control");
        }
        if self.shutter.is_moving() {
            // a half-open shutter reports neither end position
            self.shutter = ShutterStatus::Open;
            self.shutter_move = None;
        }
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<()> {
        self.power = on;
        Ok(())
    }

    fn power(&mut self) -> Result<bool> {
        Ok(self.power)
    }

    fn set_auxiliary(&mut self, on: bool) -> Result<()> {
        self.auxiliary = on;
        Ok(())
    }

    fn auxiliary(&mut self) -> Result<bool> {
        Ok(self.auxiliary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_parked_with_shutter_closed() {
        let mut sim = SimDomeMotor::new();
        let r = sim.sense(Instant::now()).unwrap();
        assert!(r.sensors.at_park);
        assert!(!r.sensors.at_home);
        assert_eq!(r.shutter, ShutterStatus::Closed);
    }

    #[test]
    fn integrates_azimuth_from_power() {
        let t0 = Instant::now();
        let mut sim = SimDomeMotor::new().at(10.0);
        sim.sense(t0).unwrap();
        sim.drive(
            Drive {
                direction: Direction::Ccw,
                speed: MAX_SPEED,
            },
            t0,
        )
        .unwrap();
        let r = sim.sense(t0 + Duration::from_secs(8)).unwrap();
        assert!((r.sensors.azimuth - 350.0).abs() < 1e-6);
    }

    #[test]
    fn shutter_travels_then_settles() {
        let mut sim = SimDomeMotor::new();
        sim.open_shutter().unwrap();
        let now = Instant::now();
        assert_eq!(sim.sense(now).unwrap().shutter, ShutterStatus::Opening);
        let later = now + SHUTTER_TRAVEL;
        assert_eq!(sim.sense(later).unwrap().shutter, ShutterStatus::Open);
    }

    #[test]
    fn shutterless_dome_refuses_shutter_moves() {
        let mut sim = SimDomeMotor::new().without_shutter();
        assert!(!sim.capabilities().can_set_shutter);
        assert!(sim.capabilities().can_park);
        assert!(sim.open_shutter().is_err());
        assert_eq!(sim.sense(Instant::now()).unwrap().shutter, ShutterStatus::Closed);
    }

    #[test]
    fn angular_distance_wraps() {
        assert!((angular_distance(359.0, 1.0) - 2.0).abs() < 1e-9);
        assert!((angular_distance(170.0, 230.0) - 60.0).abs() < 1e-9);
    }
}
