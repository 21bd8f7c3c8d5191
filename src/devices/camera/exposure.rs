//! Exposure phases
//!
//! A `startexposure` request only arms the camera. The scheduler starts the
//! sensor, polls it and downloads the image, feeding each outcome back
//! through [`transition`].

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    TakingPicture,
    Success,
    Failed,
}

impl Phase {
    /// Whether a new exposure must be refused
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Armed | Self::TakingPicture)
    }

    /// `CameraState` code: idle 0, waiting 1, exposing 2, error 5
    #[must_use]
    pub const fn camera_state(self) -> i32 {
        match self {
            Self::Idle | Self::Success => 0,
            Self::Armed => 1,
            Self::TakingPicture => 2,
            Self::Failed => 5,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Armed => "Armed",
            Self::TakingPicture => "TakingPicture",
            Self::Success => "Success",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Inputs to the exposure state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Client asked for an exposure
    Arm,
    /// Client aborted
    Abort,
    /// The sensor accepted the exposure
    Started,
    /// The sensor reports the exposure is still running
    Exposing,
    /// The image was downloaded
    ImageRead,
    /// Starting, polling or downloading failed
    Failed,
    /// Scheduler tick with nothing else to report
    Tick,
}

/// Next phase for `event` in `phase`
#[must_use]
pub const fn transition(phase: Phase, event: Event) -> Phase {
    match (phase, event) {
        (Phase::Armed | Phase::TakingPicture, Event::Arm) => phase,
        (_, Event::Arm) => Phase::Armed,
        (_, Event::Abort) => Phase::Idle,
        (Phase::Armed, Event::Started) | (Phase::TakingPicture, Event::Exposing) => {
            Phase::TakingPicture
        }
        (Phase::TakingPicture, Event::ImageRead) => Phase::Success,
        (Phase::Armed | Phase::TakingPicture, Event::Failed) => Phase::Failed,
        (Phase::Success, Event::Tick) => Phase::Idle,
        (current, _) => current,
    }
}

/// Binning and subframe, in binned pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub bin_x: u32,
    pub bin_y: u32,
    pub start_x: u32,
    pub start_y: u32,
    pub num_x: u32,
    pub num_y: u32,
}

/// Everything the sensor needs to take one picture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureRequest {
    pub duration: Duration,
    pub light: bool,
    pub frame: Frame,
    pub gain: i32,
    pub offset: i32,
    pub readout_mode: usize,
}

/// Phase plus the data that outlives one exposure
#[derive(Debug)]
pub struct Exposure {
    phase: Phase,
    request: Option<ExposureRequest>,
    started: Option<Instant>,
    stop_requested: bool,
    failure: Option<String>,
    image_ready: bool,
    last_duration: Option<Duration>,
    last_start: Option<DateTime<Utc>>,
}

impl Default for Exposure {
    fn default() -> Self {
        Self::new()
    }
}

impl Exposure {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            request: None,
            started: None,
            stop_requested: false,
            failure: None,
            image_ready: false,
            last_duration: None,
            last_start: None,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn request(&self) -> Option<&ExposureRequest> {
        self.request.as_ref()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub const fn image_ready(&self) -> bool {
        self.image_ready
    }

    #[must_use]
    pub const fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    #[must_use]
    pub const fn last_start(&self) -> Option<DateTime<Utc>> {
        self.last_start
    }

    #[must_use]
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Arm a new exposure; false when one is already in progress
    pub fn arm(&mut self, request: ExposureRequest) -> bool {
        if self.phase.is_busy() {
            return false;
        }
        self.apply(Event::Arm);
        self.request = Some(request);
        self.failure = None;
        self.image_ready = false;
        self.stop_requested = false;
        true
    }

    /// The sensor started exposing at `now`
    pub fn begin(&mut self, now: Instant) {
        self.apply(Event::Started);
        self.started = Some(now);
        self.last_start = Some(Utc::now());
        self.last_duration = self.request.map(|r| r.duration);
    }

    /// End the exposure early, keeping the image taken so far
    pub fn request_stop(&mut self) {
        if self.phase == Phase::TakingPicture {
            self.stop_requested = true;
        }
    }

    pub fn complete(&mut self, now: Instant) {
        self.apply(Event::ImageRead);
        self.image_ready = true;
        if self.stop_requested {
            self.last_duration = self.started.map(|s| now.saturating_duration_since(s));
        }
        self.stop_requested = false;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.apply(Event::Failed);
        self.failure = Some(message.into());
        self.stop_requested = false;
    }

    pub fn abort(&mut self) {
        self.apply(Event::Abort);
        self.failure = None;
        self.stop_requested = false;
    }

    pub fn apply(&mut self, event: Event) {
        self.phase = transition(self.phase, event);
    }

    /// Progress of the running exposure in percent
    #[must_use]
    pub fn percent_completed(&self, now: Instant) -> f64 {
        match self.phase {
            Phase::Idle | Phase::Success if self.image_ready => 100.0,
            Phase::TakingPicture => {
                let (Some(started), Some(request)) = (self.started, self.request) else {
                    return 0.0;
                };
                let total = request.duration.as_secs_f64();
                if total <= 0.0 {
                    return 100.0;
                }
                let done = now.saturating_duration_since(started).as_secs_f64();
                (done / total * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    /// Remaining exposure time, zero when nothing is exposing
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        match (self.phase, self.started, self.request) {
            (Phase::TakingPicture, Some(started), Some(request)) => request
                .duration
                .saturating_sub(now.saturating_duration_since(started)),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(secs: u64) -> ExposureRequest {
        ExposureRequest {
            duration: Duration::from_secs(secs),
            light: true,
            frame: Frame {
                bin_x: 1,
                bin_y: 1,
                start_x: 0,
                start_y: 0,
                num_x: 4,
                num_y: 4,
            },
            gain: 0,
            offset: 0,
            readout_mode: 0,
        }
    }

    #[test]
    fn transition_table() {
        assert_eq!(transition(Phase::Idle, Event::Arm), Phase::Armed);
        assert_eq!(transition(Phase::Armed, Event::Started), Phase::TakingPicture);
        assert_eq!(transition(Phase::TakingPicture, Event::ImageRead), Phase::Success);
        assert_eq!(transition(Phase::Success, Event::Tick), Phase::Idle);
        assert_eq!(transition(Phase::TakingPicture, Event::Failed), Phase::Failed);
        assert_eq!(transition(Phase::Failed, Event::Tick), Phase::Failed);
        assert_eq!(transition(Phase::Failed, Event::Arm), Phase::Armed);
        assert_eq!(transition(Phase::Failed, Event::Abort), Phase::Idle);
        assert_eq!(transition(Phase::TakingPicture, Event::Arm), Phase::TakingPicture);
    }

    #[test]
    fn busy_exposure_refuses_a_second_arm() {
        let mut e = Exposure::new();
        assert!(e.arm(request(5)));
        assert!(!e.arm(request(1)));
        let now = Instant::now();
        e.begin(now);
        assert!(!e.arm(request(1)));
        assert_eq!(e.request().unwrap().duration, Duration::from_secs(5));
        assert_eq!(e.remaining(now + Duration::from_secs(2)), Duration::from_secs(3));
    }

    #[test]
    fn failure_is_sticky_until_rearmed() {
        let mut e = Exposure::new();
        e.arm(request(1));
        e.begin(Instant::now());
        e.fail("sensor unplugged");
        e.apply(Event::Tick);
        assert_eq!(e.phase(), Phase::Failed);
        assert_eq!(e.failure(), Some("sensor unplugged"));

        assert!(e.arm(request(1)));
        assert_eq!(e.failure(), None);
    }

    #[test]
    fn percent_completed_tracks_elapsed_time() {
        let mut e = Exposure::new();
        let now = Instant::now();
        assert!((e.percent_completed(now) - 0.0).abs() < f64::EPSILON);
        e.arm(request(4));
        e.begin(now);
        let half = e.percent_completed(now + Duration::from_secs(2));
        assert!((half - 50.0).abs() < 1e-9);
        e.complete(now + Duration::from_secs(4));
        assert!((e.percent_completed(now) - 100.0).abs() < f64::EPSILON);
    }
}
