//! Simulated equatorial mount

use std::time::{Duration, Instant};

use super::astro::Equatorial;
use super::{MountCapabilities, MountDrive};
use crate::Result;

/// Slew rate on each axis in degrees per second
const SLEW_RATE: f64 = 4.0;
const PARK: Equatorial = Equatorial::new(0.0, 90.0);
const HOME: Equatorial = Equatorial::new(0.0, 0.0);

#[derive(Debug, Clone, Copy)]
struct Slew {
    from: Equatorial,
    to: Equatorial,
    started: Instant,
    takes: Duration,
}

impl Slew {
    fn new(from: Equatorial, to: Equatorial, now: Instant) -> Self {
        let ra_degrees = shortest_ra(from.ra, to.ra).abs() * 15.0;
        let dec_degrees = (to.dec - from.dec).abs();
        let secs = ra_degrees.max(dec_degrees) / SLEW_RATE;
        Self {
            from,
            to,
            started: now,
            takes: Duration::from_secs_f64(secs),
        }
    }

    fn done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.takes
    }

    fn position(&self, now: Instant) -> Equatorial {
        if self.done(now) || self.takes.is_zero() {
            return self.to;
        }
        let f = now.saturating_duration_since(self.started).as_secs_f64() / self.takes.as_secs_f64();
        let ra = self.from.ra + shortest_ra(self.from.ra, self.to.ra) * f;
        Equatorial::new(
            ra.rem_euclid(24.0),
            self.from.dec + (self.to.dec - self.from.dec) * f,
        )
    }
}

/// Signed right ascension change in hours taking the short way round
fn shortest_ra(from: f64, to: f64) -> f64 {
    (to - from + 12.0).rem_euclid(24.0) - 12.0
}

/// Mount that moves both axes linearly at a fixed rate
#[derive(Debug)]
pub struct SimMountDrive {
    position: Equatorial,
    slew: Option<Slew>,
}

impl SimMountDrive {
    /// Simulator starting at the park position
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: PARK,
            slew: None,
        }
    }

    /// Simulator pointing at `position`
    #[must_use]
    pub const fn at(position: Equatorial) -> Self {
        Self {
            position,
            slew: None,
        }
    }

    fn start(&mut self, to: Equatorial, now: Instant) {
        let from = self.current(now);
        self.slew = Some(Slew::new(from, to, now));
    }

    fn current(&mut self, now: Instant) -> Equatorial {
        if let Some(slew) = self.slew {
            self.position = slew.position(now);
            if slew.done(now) {
                self.slew = None;
            }
        }
        self.position
    }
}

impl Default for SimMountDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MountDrive for SimMountDrive {
    fn capabilities(&self) -> MountCapabilities {
        MountCapabilities::all()
    }

    fn position(&mut self, now: Instant) -> Result<Equatorial> {
        Ok(self.current(now))
    }

    fn slew_to(&mut self, target: Equatorial, now: Instant) -> Result<()> {
        self.start(target, now);
        Ok(())
    }

    fn park(&mut self, now: Instant) -> Result<()> {
        self.start(PARK, now);
        Ok(())
    }

    fn find_home(&mut self, now: Instant) -> Result<()> {
        self.start(HOME, now);
        Ok(())
    }

    fn is_moving(&mut self, now: Instant) -> Result<bool> {
        self.current(now);
        Ok(self.slew.is_some())
    }

    fn abort(&mut self, now: Instant) -> Result<()> {
        self.current(now);
        self.slew = None;
        Ok(())
    }

    fn sync(&mut self, position: Equatorial) -> Result<()> {
        self.slew = None;
        self.position = position;
        Ok(())
    }

    // pointing is held in equatorial coordinates, so tracking needs no model
    fn set_tracking(&mut self, _on: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slew_takes_the_longer_axis_time() {
        let t0 = Instant::now();
        let mut sim = SimMountDrive::at(Equatorial::new(1.0, 0.0));
        sim.slew_to(Equatorial::new(2.0, 10.0), t0).unwrap();
        // 15 degrees in RA at 4 deg/s
        assert!(sim.is_moving(t0 + Duration::from_secs(3)).unwrap());
        assert!(!sim.is_moving(t0 + Duration::from_secs(4)).unwrap());
        let p = sim.position(t0 + Duration::from_secs(4)).unwrap();
        assert!((p.ra - 2.0).abs() < 1e-9);
        assert!((p.dec - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ra_goes_the_short_way_round() {
        assert!((shortest_ra(23.0, 1.0) - 2.0).abs() < 1e-9);
        assert!((shortest_ra(1.0, 23.0) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn abort_freezes_mid_slew() {
        let t0 = Instant::now();
        let mut sim = SimMountDrive::at(Equatorial::new(0.0, 0.0));
        sim.slew_to(Equatorial::new(0.0, 40.0), t0).unwrap();
        sim.abort(t0 + Duration::from_secs(5)).unwrap();
        let p = sim.position(t0 + Duration::from_secs(20)).unwrap();
        assert!((p.dec - 20.0).abs() < 1e-9);
    }
}
