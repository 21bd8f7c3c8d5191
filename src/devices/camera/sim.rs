//! Simulated imaging sensor

use std::time::{Duration, Instant};

use super::exposure::ExposureRequest;
use super::{CameraSensor, Image, SensorInfo};
use crate::{Error, Result};

const AMBIENT: f64 = 20.0;
/// Cooler slew rate in degrees per second
const COOLING_RATE: f64 = 1.0;

/// Sensor whose exposures finish after their duration and read out a
/// diagonal gradient
#[derive(Debug)]
pub struct SimCameraSensor {
    info: SensorInfo,
    exposing: Option<(ExposureRequest, Instant)>,
    temperature: f64,
    temperature_at: Option<Instant>,
    cooler_on: bool,
    target: f64,
    failure: Option<String>,
}

impl SimCameraSensor {
    /// A 640x480 monochrome sensor
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(640, 480)
    }

    #[must_use]
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            info: SensorInfo {
                name: "Simulated CMOS".to_string(),
                width,
                height,
                pixel_size_x: 3.76,
                pixel_size_y: 3.76,
                max_bin: 4,
                max_adu: 65535,
                electrons_per_adu: 0.25,
                full_well_capacity: 50_000.0,
                exposure_min: 0.001,
                exposure_max: 3600.0,
                exposure_resolution: 0.001,
                gain_min: 0,
                gain_max: 300,
                offset_min: 0,
                offset_max: 255,
                readout_modes: vec!["Normal".to_string(), "Fast".to_string()],
                sensor_type: 0,
                has_shutter: false,
                can_set_temperature: true,
                can_get_cooler_power: true,
            },
            exposing: None,
            temperature: AMBIENT,
            temperature_at: None,
            cooler_on: false,
            target: AMBIENT,
            failure: None,
        }
    }

    /// Make every readout fail with `message`
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn settle_temperature(&mut self, now: Instant) {
        let elapsed = self
            .temperature_at
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        self.temperature_at = Some(now);
        let goal = if self.cooler_on { self.target } else { AMBIENT };
        let step = elapsed.as_secs_f64() * COOLING_RATE;
        let gap = goal - self.temperature;
        self.temperature += gap.clamp(-step, step);
    }

    fn gradient(&self, request: &ExposureRequest) -> Image {
        let frame = request.frame;
        let span = u64::from(self.info.width + self.info.height).max(1);
        let max = u64::from(self.info.max_adu);
        let offset = u32::try_from(request.offset.max(0)).unwrap_or(0);
        let light = request.light;
        Image::from_fn(frame.num_x, frame.num_y, |x, y| {
            if !light {
                return offset;
            }
            let sx = u64::from((frame.start_x + x) * frame.bin_x);
            let sy = u64::from((frame.start_y + y) * frame.bin_y);
            let level = (sx + sy) * max / span;
            u32::try_from(level).unwrap_or(u32::MAX).saturating_add(offset)
        })
    }
}

impl Default for SimCameraSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSensor for SimCameraSensor {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    fn start_exposure(&mut self, request: &ExposureRequest, now: Instant) -> Result<()> {
        self.exposing = Some((*request, now));
        Ok(())
    }

    fn is_exposing(&mut self, now: Instant) -> Result<bool> {
        Ok(self
            .exposing
            .is_some_and(|(r, started)| now.saturating_duration_since(started) < r.duration))
    }

    fn read_image(&mut self, _now: Instant) -> Result<Image> {
        let Some((request, _)) = self.exposing.take() else {
            return Err(Error::Hardware("no exposure to read".to_string()));
        };
        if let Some(message) = &self.failure {
            return Err(Error::Hardware(message.clone()));
        }
        Ok(self.gradient(&request))
    }

    fn abort(&mut self) -> Result<()> {
        self.exposing = None;
        Ok(())
    }

    fn temperature(&mut self, now: Instant) -> Result<f64> {
        self.settle_temperature(now);
        Ok(self.temperature)
    }

    fn set_cooler(&mut self, on: bool, target: f64, now: Instant) -> Result<()> {
        self.settle_temperature(now);
        self.cooler_on = on;
        self.target = target;
        Ok(())
    }

    fn cooler_power(&mut self, now: Instant) -> Result<f64> {
        self.settle_temperature(now);
        if !self.cooler_on {
            return Ok(0.0);
        }
        let load = (AMBIENT - self.temperature) / 40.0 * 100.0;
        Ok(load.clamp(0.0, 100.0))
    }
}
