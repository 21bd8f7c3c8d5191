//! Dome rotation state machine
//!
//! [`Motion`] is pure: it takes sensor readings and the current time and
//! decides the next state and the motor output. The device applies the
//! resulting [`Drive`] to its [`super::DomeMotor`].

use std::fmt;
use std::time::{Duration, Instant};

/// Highest motor power level
pub const MAX_SPEED: u16 = 1023;
/// Power level a rotation starts at, also used for slow and bump moves
pub const START_SPEED: u16 = 500;
/// Below this level the motor is switched off while slowing down
pub const MIN_SPEED: u16 = 200;

const SPEED_UP_STEP: Duration = Duration::from_millis(2);
const SLOW_DOWN_STEP: Duration = Duration::from_millis(1);
const REVERSE_PAUSE: Duration = Duration::from_secs(30);
const BUMP_TIME: Duration = Duration::from_millis(2500);
const MANUAL_MIN_TIME: Duration = Duration::from_secs(2);
/// A full revolution takes a little over two minutes
pub const HARD_STOP: Duration = Duration::from_secs(130);

/// Distance at which a slew cuts power immediately
const STOP_NOW_DEGREES: f64 = 0.10;
/// Distance at which a slew starts slowing down to stop
const STOP_DEGREES: f64 = 0.25;
/// Distance at which a fast slew starts shedding speed
const APPROACH_DEGREES: f64 = 5.0;

const ACTIVE_POLL: Duration = Duration::from_micros(250);
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Cw,
    Ccw,
}

impl Direction {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Cw => Self::Ccw,
            Self::Ccw => Self::Cw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeState {
    Idle,
    SpeedingUp,
    Moving,
    SlowingDown,
    Stopped,
    ReversingSlowing,
    ReversingWaiting,
}

impl fmt::Display for DomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::SpeedingUp => "Speeding up",
            Self::Moving => "Moving",
            Self::SlowingDown => "Slowing down",
            Self::Stopped => "Stopped",
            Self::ReversingSlowing => "Reversing-Slowing",
            Self::ReversingWaiting => "Reversing-Waiting",
        };
        f.write_str(name)
    }
}

/// What the current rotation is trying to reach
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    /// Free rotation, only the hard stop applies
    None,
    Home,
    Park,
    /// Short timed move
    Bump,
    /// Operator move, ends at the next sensor
    Manual,
    /// Slew to an azimuth in degrees
    Azimuth(f64),
}

/// Inputs read from the hardware before each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensors {
    pub azimuth: f64,
    pub at_home: bool,
    pub at_park: bool,
}

/// Motor output; a speed of zero means the motor is off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drive {
    pub direction: Direction,
    pub speed: u16,
}

/// How quickly a stop takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Ramp the motor down
    Normal,
    /// Cut power
    Now,
}

/// Rotation state plus the timers the transitions depend on
#[derive(Debug, Clone)]
pub struct Motion {
    state: DomeState,
    direction: Direction,
    speed: u16,
    goal: Goal,
    moving_since: Instant,
    last_speed_change: Instant,
}

impl Motion {
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            state: DomeState::Idle,
            direction: Direction::Cw,
            speed: 0,
            goal: Goal::None,
            moving_since: now,
            last_speed_change: now,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DomeState {
        self.state
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn speed(&self) -> u16 {
        self.speed
    }

    #[must_use]
    pub const fn goal(&self) -> Goal {
        self.goal
    }

    /// Whether the motor is powered
    #[must_use]
    pub const fn is_slewing(&self) -> bool {
        self.speed > 0
    }

    #[must_use]
    pub const fn drive(&self) -> Drive {
        Drive {
            direction: self.direction,
            speed: self.speed,
        }
    }

    /// Start rotating and ramp up to full speed
    pub fn start(&mut self, direction: Direction, goal: Goal, now: Instant) {
        self.begin(direction, goal, now);
        self.state = DomeState::SpeedingUp;
    }

    /// Start rotating at the starting speed without ramping up
    pub fn start_slow(&mut self, direction: Direction, goal: Goal, now: Instant) {
        self.begin(direction, goal, now);
        self.state = DomeState::Moving;
    }

    fn begin(&mut self, direction: Direction, goal: Goal, now: Instant) {
        self.direction = direction;
        self.goal = goal;
        self.speed = START_SPEED;
        self.moving_since = now;
        self.last_speed_change = now;
    }

    /// Retarget a rotation already in progress
    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = goal;
    }

    /// End the current rotation and forget its goal
    pub fn stop(&mut self, how: Stop, now: Instant) {
        self.goal = Goal::None;
        match how {
            Stop::Now => {
                self.speed = 0;
                self.state = DomeState::Stopped;
            }
            Stop::Normal if self.speed == 0 => self.state = DomeState::Stopped,
            Stop::Normal => {
                self.state = DomeState::SlowingDown;
                self.last_speed_change = now;
            }
        }
    }

    /// Advance one step and return the delay wanted until the next one
    pub fn step(&mut self, sensors: Sensors, now: Instant) -> Duration {
        match self.state {
            DomeState::Idle => return IDLE_POLL,
            DomeState::SpeedingUp => {
                if self.ramp(now, SPEED_UP_STEP, true) {
                    self.state = DomeState::Moving;
                }
                self.check_moving(sensors, now);
            }
            DomeState::Moving => self.check_moving(sensors, now),
            DomeState::SlowingDown => {
                if self.ramp(now, SLOW_DOWN_STEP, false) {
                    self.state = DomeState::Stopped;
                }
            }
            DomeState::Stopped => self.state = DomeState::Idle,
            DomeState::ReversingSlowing => {
                if self.ramp(now, SLOW_DOWN_STEP, false) {
                    self.state = DomeState::ReversingWaiting;
                    self.last_speed_change = now;
                }
            }
            DomeState::ReversingWaiting => {
                if now.saturating_duration_since(self.last_speed_change) >= REVERSE_PAUSE {
                    if self.direction == Direction::Cw {
                        self.start(Direction::Ccw, self.goal, now);
                    } else {
                        self.goal = Goal::None;
                        self.state = DomeState::Idle;
                    }
                }
            }
        }
        ACTIVE_POLL
    }

    /// Change speed by one level per elapsed `interval`; true once the limit is hit
    fn ramp(&mut self, now: Instant, interval: Duration, up: bool) -> bool {
        let elapsed = now.saturating_duration_since(self.last_speed_change);
        let steps = elapsed.as_micros() / interval.as_micros();
        if steps == 0 {
            return false;
        }
        let steps = u16::try_from(steps).unwrap_or(u16::MAX);
        self.last_speed_change = now;
        if up {
            self.speed = self.speed.saturating_add(steps).min(MAX_SPEED);
            self.speed == MAX_SPEED
        } else {
            self.speed = self.speed.saturating_sub(steps);
            if self.speed < MIN_SPEED {
                self.speed = 0;
            }
            self.speed == 0
        }
    }

    fn check_moving(&mut self, sensors: Sensors, now: Instant) {
        let moving_for = now.saturating_duration_since(self.moving_since);

        match self.goal {
            Goal::None => {}
            Goal::Home => {
                if sensors.at_home {
                    self.stop(Stop::Normal, now);
                    return;
                }
            }
            Goal::Park => {
                if sensors.at_park {
                    self.stop(Stop::Normal, now);
                    return;
                }
                // the home sensor sits clockwise of park, reaching it
                // while turning clockwise means the wrong way round
                if sensors.at_home && self.direction == Direction::Cw {
                    self.state = DomeState::ReversingSlowing;
                    self.last_speed_change = now;
                    return;
                }
            }
            Goal::Bump => {
                if moving_for >= BUMP_TIME {
                    self.stop(Stop::Normal, now);
                    return;
                }
            }
            Goal::Manual => {
                if moving_for >= MANUAL_MIN_TIME && (sensors.at_home || sensors.at_park) {
                    tracing::debug!("manual move reached a stop point");
                    self.stop(Stop::Normal, now);
                    return;
                }
            }
            Goal::Azimuth(target) => {
                if self.approach(target, sensors.azimuth, now) {
                    return;
                }
            }
        }

        if moving_for >= HARD_STOP {
            tracing::warn!(?moving_for, "rotation exceeded the hard stop time");
            self.stop(Stop::Normal, now);
        }
    }

    /// Slow down near `target` and stop on arrival or overshoot
    fn approach(&mut self, target: f64, azimuth: f64, now: Instant) -> bool {
        let remaining = (target - azimuth).abs();
        if remaining < STOP_NOW_DEGREES {
            self.stop(Stop::Now, now);
            return true;
        }
        if remaining < STOP_DEGREES {
            self.stop(Stop::Normal, now);
            return true;
        }
        if remaining < APPROACH_DEGREES && self.speed > START_SPEED {
            self.speed = self.speed.saturating_sub(10).max(START_SPEED);
            self.last_speed_change = now;
        }

        let overshot = match self.direction {
            Direction::Cw => azimuth > target,
            Direction::Ccw => azimuth < target,
        };
        if overshot {
            tracing::debug!(target, azimuth, "slew went past its target");
            self.stop(Stop::Now, now);
        }
        overshot
    }
}

/// Direction for a slew from `azimuth` to `target`, `None` when close enough
#[must_use]
pub fn slew_direction(azimuth: f64, target: f64) -> Option<Direction> {
    let delta = target - azimuth;
    if (1.0..180.0).contains(&delta) {
        Some(Direction::Cw)
    } else if delta <= -1.0 {
        Some(Direction::Ccw)
    } else {
        None
    }
}

/// Direction toward a fixed sensor position such as park or home
#[must_use]
pub fn sensor_direction(azimuth: f64, position: f64) -> Direction {
    let delta = azimuth - position;
    if delta > 0.0 && delta < 180.0 {
        Direction::Ccw
    } else {
        Direction::Cw
    }
}
