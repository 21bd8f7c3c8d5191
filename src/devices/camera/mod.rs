//! Imaging camera
//!
//! `startexposure` only arms an exposure. The scheduler starts it on the
//! sensor, polls until the sensor is done and downloads the image; see
//! [`exposure`] for the phases. Those sensor calls run on the camera's
//! [`readout`] worker, so a slow download never stalls the scheduler. A
//! finished image is shared behind an `Arc` so `imagearray` streams it
//! without holding the device lock.
//!
//! The device lock and the sensor lock are never held together.

pub mod commands;
pub mod exposure;
pub mod readout;
pub mod sim;

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

pub use exposure::{Event, Exposure, ExposureRequest, Frame, Phase};
pub use sim::SimCameraSensor;

use self::commands as cmd;
use self::readout::{Call, Done, Readout, Reply, SharedSensor};
use super::lock;
use crate::device::{DEFAULT_WATCHDOG, Device, DeviceCore, IDLE_POLL, write_value};
use crate::protocol::{AlpacaStatus, CommandEntry, CommandTable, DeviceType, VALUE, Verb};
use crate::request::Request;
use crate::scheduler::StateLog;
use crate::wire::{JsonEncoder, StateItem};
use crate::{Error, Result};

/// Poll period while the sensor is exposing
const EXPOSING_POLL: Duration = Duration::from_millis(10);
/// Delay after a phase change that needs another step right away
const ACTIVE_POLL: Duration = Duration::from_millis(1);

/// `ImageArray` element type code for 32-bit integers
const IMAGE_TYPE_INT32: i32 = 2;

/// Fixed sensor properties
#[derive(Debug, Clone, PartialEq)]
pub struct SensorInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub max_bin: u32,
    pub max_adu: u32,
    pub electrons_per_adu: f64,
    pub full_well_capacity: f64,
    /// Shortest exposure in seconds
    pub exposure_min: f64,
    /// Longest exposure in seconds
    pub exposure_max: f64,
    pub exposure_resolution: f64,
    pub gain_min: i32,
    pub gain_max: i32,
    pub offset_min: i32,
    pub offset_max: i32,
    pub readout_modes: Vec<String>,
    /// 0 monochrome, 2 RGGB
    pub sensor_type: i32,
    pub has_shutter: bool,
    pub can_set_temperature: bool,
    pub can_get_cooler_power: bool,
}

/// A downloaded frame, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Image {
    /// Build an image by evaluating `f(x, y)` for every pixel
    #[must_use]
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u32) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// One column as a JSON array, the unit `imagearray` streams
    fn column_json(&self, x: u32, trailing_comma: bool) -> String {
        let mut text = String::with_capacity(self.height as usize * 6 + 2);
        text.push('[');
        for y in 0..self.height {
            if y > 0 {
                text.push(',');
            }
            text.push_str(&self.pixel(x, y).to_string());
        }
        text.push(']');
        if trailing_comma {
            text.push(',');
        }
        text
    }
}

fn unsupported<T>(status: AlpacaStatus, what: &str) -> Result<T> {
    Err(Error::alpaca(status, format!("{what} not supported")))
}

/// Hardware behind a camera
pub trait CameraSensor: Send {
    fn info(&self) -> &SensorInfo;

    /// # Errors
    ///
    /// Returns error if the sensor cannot be opened
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns error if the sensor cannot be released
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Begin integrating
    ///
    /// # Errors
    ///
    /// Returns error if the exposure cannot be started
    fn start_exposure(&mut self, request: &ExposureRequest, now: Instant) -> Result<()>;

    /// Whether the running exposure is still collecting light
    ///
    /// # Errors
    ///
    /// Returns error if the sensor cannot be queried
    fn is_exposing(&mut self, now: Instant) -> Result<bool>;

    /// Download the finished exposure
    ///
    /// # Errors
    ///
    /// Returns error if the readout fails
    fn read_image(&mut self, now: Instant) -> Result<Image>;

    /// # Errors
    ///
    /// Returns error if the exposure cannot be cancelled
    fn abort(&mut self) -> Result<()>;

    /// Sensor temperature in degrees Celsius
    ///
    /// # Errors
    ///
    /// Returns error if there is no temperature sensor
    fn temperature(&mut self, _now: Instant) -> Result<f64> {
        unsupported(AlpacaStatus::PropertyNotImplemented, "CCD temperature")
    }

    /// # Errors
    ///
    /// Returns error if there is no cooler
    fn set_cooler(&mut self, _on: bool, _target: f64, _now: Instant) -> Result<()> {
        unsupported(AlpacaStatus::PropertyNotImplemented, "Cooler control")
    }

    /// Cooler load in percent
    ///
    /// # Errors
    ///
    /// Returns error if the cooler cannot report its power
    fn cooler_power(&mut self, _now: Instant) -> Result<f64> {
        unsupported(AlpacaStatus::PropertyNotImplemented, "Cooler power")
    }
}

struct CameraInner {
    exposure: Exposure,
    /// Bumped whenever a new exposure is armed or the current one is dropped
    exposure_id: u64,
    /// The sensor reported the light collection finished
    integrated: bool,
    /// The sensor may still be exposing for a dropped exposure
    abort_sensor: bool,
    readout: Option<Readout>,
    image: Option<Arc<Image>>,
    log: StateLog<Phase>,
    frame: Frame,
    gain: i32,
    offset: i32,
    readout_mode: usize,
    cooler_on: bool,
    target_temperature: f64,
}

impl CameraInner {
    fn fail(&mut self, e: &Error) {
        tracing::warn!(error = %e, "exposure failed");
        let message = match e {
            Error::Alpaca { message, .. } | Error::Hardware(message) => message.clone(),
            other => other.to_string(),
        };
        self.exposure.fail(message);
    }

    fn arm(&mut self, request: ExposureRequest) -> bool {
        if !self.exposure.arm(request) {
            return false;
        }
        self.exposure_id = self.exposure_id.wrapping_add(1);
        self.integrated = false;
        self.image = None;
        true
    }

    fn abort(&mut self) {
        self.exposure.abort();
        self.exposure_id = self.exposure_id.wrapping_add(1);
        self.integrated = false;
    }

    /// Apply a reply from the readout worker
    fn finish(&mut self, done: Done) {
        if let Reply::Aborted(Err(e)) = &done.reply {
            tracing::warn!(error = %e, "failed to abort exposure");
            return;
        }
        if done.exposure != self.exposure_id {
            if matches!(done.reply, Reply::Started(Ok(()))) {
                self.abort_sensor = true;
            }
            return;
        }
        match done.reply {
            Reply::Started(Ok(())) => self.exposure.begin(done.at),
            Reply::Exposing(Ok(true)) => self.exposure.apply(Event::Exposing),
            Reply::Exposing(Ok(false)) => self.integrated = true,
            Reply::Image(Ok(image)) => {
                tracing::debug!(
                    width = image.width(),
                    height = image.height(),
                    "image downloaded"
                );
                self.image = Some(Arc::new(image));
                self.exposure.complete(done.at);
            }
            Reply::Aborted(_) => {}
            Reply::Started(Err(e)) | Reply::Exposing(Err(e)) | Reply::Image(Err(e)) => {
                self.fail(&e);
            }
        }
    }

    /// Hand `call` to the readout worker, starting it on first use
    fn submit(
        &mut self,
        call: Call,
        now: Instant,
        spawn: impl FnOnce() -> Result<Readout>,
    ) -> Result<()> {
        let readout = match self.readout.take() {
            Some(readout) => readout,
            None => spawn()?,
        };
        self.readout.insert(readout).submit(self.exposure_id, call, now)
    }

    /// Next sensor call for the current phase, with the delay until the next step
    fn next_call(&mut self, now: Instant, consumed: bool) -> (Option<Call>, Duration) {
        if self.abort_sensor {
            self.abort_sensor = false;
            return (Some(Call::Abort), ACTIVE_POLL);
        }
        match self.exposure.phase() {
            Phase::Armed => match self.exposure.request().copied() {
                Some(request) => (Some(Call::Start(request)), ACTIVE_POLL),
                None => {
                    self.exposure.fail("armed without a request");
                    (None, IDLE_POLL)
                }
            },
            Phase::TakingPicture if self.integrated || self.exposure.stop_requested() => {
                (Some(Call::Read), ACTIVE_POLL)
            }
            Phase::TakingPicture => (
                Some(Call::Poll),
                EXPOSING_POLL.min(self.exposure.remaining(now).max(ACTIVE_POLL)),
            ),
            // leave Success visible for one step after the download
            Phase::Success if consumed => (None, ACTIVE_POLL),
            Phase::Success => {
                self.exposure.apply(Event::Tick);
                (None, IDLE_POLL)
            }
            Phase::Idle | Phase::Failed => (None, IDLE_POLL),
        }
    }

    fn percent_completed(&self, now: Instant) -> i32 {
        as_percent(self.exposure.percent_completed(now))
    }
}

/// Cooling readings taken without waiting on the sensor
#[derive(Debug, Clone, Copy, Default)]
struct Cooling {
    temperature: Option<f64>,
    power: Option<f64>,
}

#[allow(clippy::cast_possible_truncation)]
fn as_percent(value: f64) -> i32 {
    value.clamp(0.0, 100.0).round() as i32
}

/// Camera tuning
#[derive(Debug, Clone, Copy)]
pub struct CameraSettings {
    pub watchdog: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            watchdog: DEFAULT_WATCHDOG,
        }
    }
}

/// Alpaca camera device
pub struct Camera {
    core: DeviceCore,
    info: SensorInfo,
    sensor: SharedSensor,
    inner: Mutex<CameraInner>,
}

impl Camera {
    /// Create a camera reading from `sensor`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sensor: Box<dyn CameraSensor>,
        settings: CameraSettings,
    ) -> Self {
        let name = name.into();
        let info = sensor.info().clone();
        let inner = CameraInner {
            exposure: Exposure::new(),
            exposure_id: 0,
            integrated: false,
            abort_sensor: false,
            readout: None,
            image: None,
            log: StateLog::new(name.clone()),
            frame: full_frame(&info, 1),
            gain: info.gain_min,
            offset: info.offset_min,
            readout_mode: 0,
            cooler_on: false,
            target_temperature: 0.0,
        };
        Self {
            core: DeviceCore::new(DeviceType::Camera, name).with_watchdog(settings.watchdog),
            info,
            sensor: Arc::new(Mutex::new(sensor)),
            inner: Mutex::new(inner),
        }
    }

    /// Simulated camera
    #[must_use]
    pub fn simulated(name: impl Into<String>, settings: CameraSettings) -> Self {
        Self::new(name, Box::new(SimCameraSensor::new()), settings)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        lock(&self.inner).exposure.phase()
    }

    /// Advance the exposure at `now`
    ///
    /// Never touches the sensor: replies from the readout worker are picked
    /// up here and the next call is queued behind them.
    pub fn step(&self, now: Instant) -> Duration {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let mut consumed = false;
        if let Some(readout) = &mut inner.readout {
            if readout.is_busy() {
                return EXPOSING_POLL;
            }
            if let Some(done) = readout.take() {
                inner.finish(done);
                consumed = true;
            }
        }

        let (call, mut delay) = inner.next_call(now, consumed);
        if let Some(call) = call {
            let spawn = || Readout::spawn(self.core.name(), Arc::clone(&self.sensor));
            if let Err(e) = inner.submit(call, now, spawn) {
                inner.fail(&e);
                delay = IDLE_POLL;
            }
        }
        inner.log.observe(inner.exposure.phase());
        delay
    }

    fn sensor(&self) -> MutexGuard<'_, Box<dyn CameraSensor>> {
        lock(&self.sensor)
    }

    /// Cooling readings, skipped while the readout worker holds the sensor
    fn cooling(&self, now: Instant) -> Cooling {
        let mut sensor = match self.sensor.try_lock() {
            Ok(sensor) => sensor,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return Cooling::default(),
        };
        Cooling {
            temperature: sensor.temperature(now).ok(),
            power: sensor.cooler_power(now).ok(),
        }
    }

    fn state_items(&self, now: Instant) -> Vec<StateItem> {
        let cooling = self.cooling(now);
        let inner = lock(&self.inner);
        let mut items = vec![StateItem::new(
            "CameraState",
            inner.exposure.phase().camera_state(),
        )];
        if let Some(temperature) = cooling.temperature {
            items.push(StateItem::new("CCDTemperature", temperature));
        }
        if let Some(power) = cooling.power {
            items.push(StateItem::new("CoolerPower", power));
        }
        items.push(StateItem::new("ImageReady", inner.exposure.image_ready()));
        items.push(StateItem::new("IsPulseGuiding", false));
        items.push(StateItem::new("PercentCompleted", inner.percent_completed(now)));
        items
    }

    /// Wait until the readout worker has answered its last call
    #[cfg(test)]
    fn wait_for_sensor(&self) {
        for _ in 0..10_000 {
            let busy = lock(&self.inner).readout.as_ref().is_some_and(Readout::is_busy);
            if !busy {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("sensor call never finished");
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        let bins = 1..=self.info.max_bin;
        if !bins.contains(&frame.bin_x) || !bins.contains(&frame.bin_y) {
            return Err(Error::invalid_value(format!(
                "Binning {}x{} is out of range 1 to {}",
                frame.bin_x, frame.bin_y, self.info.max_bin
            )));
        }
        let width = self.info.width / frame.bin_x;
        let height = self.info.height / frame.bin_y;
        if frame.num_x < 1
            || frame.num_y < 1
            || frame.start_x + frame.num_x > width
            || frame.start_y + frame.num_y > height
        {
            return Err(Error::invalid_value(format!(
                "Subframe {}+{} x {}+{} does not fit the {width}x{height} binned sensor",
                frame.start_x, frame.num_x, frame.start_y, frame.num_y
            )));
        }
        Ok(())
    }

    fn exposure_request(&self, inner: &CameraInner, req: &Request) -> Result<ExposureRequest> {
        let seconds = req.params.f64("Duration")?;
        let light = req.params.bool("Light")?;
        if seconds <= 0.0 || seconds < self.info.exposure_min || seconds > self.info.exposure_max
        {
            return Err(Error::invalid_value(format!(
                "Duration {seconds} is out of range {} to {}",
                self.info.exposure_min, self.info.exposure_max
            )));
        }
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|e| Error::invalid_value(format!("Duration {seconds}: {e}")))?;
        self.check_frame(&inner.frame)?;
        Ok(ExposureRequest {
            duration,
            light,
            frame: inner.frame,
            gain: inner.gain,
            offset: inner.offset,
            readout_mode: inner.readout_mode,
        })
    }

    fn bin_param(&self, req: &Request, key: &str) -> Result<u32> {
        let bin = req.params.i32(key)?;
        u32::try_from(bin)
            .ok()
            .filter(|b| (1..=self.info.max_bin).contains(b))
            .ok_or_else(|| {
                Error::invalid_value(format!(
                    "{key} {bin} is out of range 1 to {}",
                    self.info.max_bin
                ))
            })
    }

    fn ranged(req: &Request, key: &str, min: i32, max: i32) -> Result<i32> {
        let value = req.params.i32(key)?;
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Error::invalid_value(format!(
                "{key} {value} is out of range {min} to {max}"
            )))
        }
    }

    fn non_negative(req: &Request, key: &str, min: i32) -> Result<u32> {
        let value = req.params.i32(key)?;
        u32::try_from(value)
            .ok()
            .filter(|v| i64::from(*v) >= i64::from(min))
            .ok_or_else(|| Error::invalid_value(format!("{key} {value} must be at least {min}")))
    }

    fn write_image(&self, out: &mut JsonEncoder<'_>) -> Result<()> {
        let image = {
            let inner = lock(&self.inner);
            if inner.exposure.phase() == Phase::Failed {
                return Err(Error::alpaca(
                    AlpacaStatus::FailedToTakePicture,
                    inner.exposure.failure().unwrap_or("exposure failed"),
                ));
            }
            match (&inner.image, inner.exposure.image_ready()) {
                (Some(image), true) => Arc::clone(image),
                _ => return Err(Error::invalid_operation("No image available")),
            }
        };
        out.add_i32("Type", IMAGE_TYPE_INT32, true)?;
        out.add_i32("Rank", 2, true)?;
        out.add_array_start(VALUE)?;
        let last = image.width().saturating_sub(1);
        for x in 0..image.width() {
            out.add_raw_text(&image.column_json(x, x < last))?;
        }
        out.add_array_end(true)?;
        Ok(())
    }

    fn write_readall(&self, out: &mut JsonEncoder<'_>) -> Result<()> {
        for item in self.state_items(Instant::now()) {
            out.add_field(&item, true)?;
        }
        let inner = lock(&self.inner);
        out.add_u32("BinX", inner.frame.bin_x, true)?;
        out.add_u32("BinY", inner.frame.bin_y, true)?;
        out.add_u32("CameraXSize", self.info.width, true)?;
        out.add_u32("CameraYSize", self.info.height, true)?;
        out.add_bool("CoolerOn", inner.cooler_on, true)?;
        out.add_i32("Gain", inner.gain, true)?;
        out.add_i32("Offset", inner.offset, true)?;
        out.add_u32("NumX", inner.frame.num_x, true)?;
        out.add_u32("NumY", inner.frame.num_y, true)?;
        out.add_u32("StartX", inner.frame.start_x, true)?;
        out.add_u32("StartY", inner.frame.start_y, true)?;
        out.add_f64("SetCCDTemperature", inner.target_temperature, true)?;
        out.add_string("SensorName", &self.info.name, true)?;
        out.add_string("ExposurePhase", &inner.exposure.phase().to_string(), true)?;
        out.add_string(
            "LastError",
            inner.exposure.failure().unwrap_or_default(),
            true,
        )?;
        Ok(())
    }
}

fn full_frame(info: &SensorInfo, bin: u32) -> Frame {
    Frame {
        bin_x: bin,
        bin_y: bin,
        start_x: 0,
        start_y: 0,
        num_x: info.width / bin,
        num_y: info.height / bin,
    }
}

impl Device for Camera {
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

        // commands that stream or reach the sensor run without the device lock
        match entry.id {
            cmd::IMAGE_ARRAY => return self.write_image(out),
            cmd::READ_ALL => return self.write_readall(out),
            cmd::CCD_TEMPERATURE => {
                let temperature = self.sensor().temperature(now)?;
                out.add_f64(VALUE, temperature, true)?;
                return Ok(());
            }
            cmd::COOLER_POWER => {
                if !self.info.can_get_cooler_power {
                    return unsupported(AlpacaStatus::PropertyNotImplemented, "Cooler power");
                }
                let power = self.sensor().cooler_power(now)?;
                out.add_f64(VALUE, power, true)?;
                return Ok(());
            }
            cmd::COOLER_ON if req.verb == Verb::Put => {
                let on = req.params.bool("CoolerOn")?;
                let target = lock(&self.inner).target_temperature;
                self.sensor().set_cooler(on, target, now)?;
                lock(&self.inner).cooler_on = on;
                tracing::info!(device = %self.core.name(), on, "cooler switched");
                return Ok(());
            }
            cmd::SET_CCD_TEMPERATURE if req.verb == Verb::Put => {
                if !self.info.can_set_temperature {
                    return unsupported(
                        AlpacaStatus::PropertyNotImplemented,
                        "Setting the CCD temperature",
                    );
                }
                let target = req.params.f64("SetCCDTemperature")?;
                if !(-100.0..=50.0).contains(&target) {
                    return Err(Error::invalid_value(format!(
                        "SetCCDTemperature {target} is out of range -100 to 50"
                    )));
                }
                let on = lock(&self.inner).cooler_on;
                self.sensor().set_cooler(on, target, now)?;
                lock(&self.inner).target_temperature = target;
                return Ok(());
            }
            cmd::ABORT_EXPOSURE => {
                let exposing = {
                    let mut inner = lock(&self.inner);
                    let exposing = inner.exposure.phase().is_busy();
                    inner.abort();
                    exposing
                };
                if exposing {
                    self.sensor().abort()?;
                }
                tracing::info!(device = %self.core.name(), "exposure aborted");
                return Ok(());
            }
            _ => {}
        }

        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let info = &self.info;

        match entry.id {
            cmd::BAYER_OFFSET_X | cmd::BAYER_OFFSET_Y => {
                if info.sensor_type == 0 {
                    return unsupported(
                        AlpacaStatus::PropertyNotImplemented,
                        "Bayer offset on a monochrome sensor",
                    );
                }
                out.add_i32(VALUE, 0, true)?;
            }
            cmd::BIN_X | cmd::BIN_Y => match req.verb {
                Verb::Get => {
                    let bin = if entry.id == cmd::BIN_X {
                        inner.frame.bin_x
                    } else {
                        inner.frame.bin_y
                    };
                    out.add_u32(VALUE, bin, true)?;
                }
                Verb::Put => {
                    let key = if entry.id == cmd::BIN_X { "BinX" } else { "BinY" };
                    let bin = self.bin_param(req, key)?;
                    // symmetric binning only; the subframe resets to the full sensor
                    inner.frame = full_frame(info, bin);
                }
            },
            cmd::CAMERA_STATE => {
                out.add_i32(VALUE, inner.exposure.phase().camera_state(), true)?;
            }
            cmd::CAMERA_X_SIZE => {
                out.add_u32(VALUE, info.width, true)?;
            }
            cmd::CAMERA_Y_SIZE => {
                out.add_u32(VALUE, info.height, true)?;
            }
            cmd::CAN_ABORT_EXPOSURE | cmd::CAN_STOP_EXPOSURE => {
                out.add_bool(VALUE, true, true)?;
            }
            cmd::CAN_ASYMMETRIC_BIN | cmd::CAN_FAST_READOUT | cmd::CAN_PULSE_GUIDE => {
                out.add_bool(VALUE, false, true)?;
            }
            cmd::CAN_GET_COOLER_POWER => {
                out.add_bool(VALUE, info.can_get_cooler_power, true)?;
            }
            cmd::CAN_SET_CCD_TEMPERATURE => {
                out.add_bool(VALUE, info.can_set_temperature, true)?;
            }
            cmd::COOLER_ON => {
                out.add_bool(VALUE, inner.cooler_on, true)?;
            }
            cmd::ELECTRONS_PER_ADU => {
                out.add_f64(VALUE, info.electrons_per_adu, true)?;
            }
            cmd::EXPOSURE_MAX => {
                out.add_f64(VALUE, info.exposure_max, true)?;
            }
            cmd::EXPOSURE_MIN => {
                out.add_f64(VALUE, info.exposure_min, true)?;
            }
            cmd::EXPOSURE_RESOLUTION => {
                out.add_f64(VALUE, info.exposure_resolution, true)?;
            }
            cmd::FULL_WELL_CAPACITY => {
                out.add_f64(VALUE, info.full_well_capacity, true)?;
            }
            cmd::GAIN => match req.verb {
                Verb::Get => {
                    out.add_i32(VALUE, inner.gain, true)?;
                }
                Verb::Put => {
                    inner.gain = Self::ranged(req, "Gain", info.gain_min, info.gain_max)?;
                }
            },
            cmd::GAIN_MAX => {
                out.add_i32(VALUE, info.gain_max, true)?;
            }
            cmd::GAIN_MIN => {
                out.add_i32(VALUE, info.gain_min, true)?;
            }
            cmd::HAS_SHUTTER => {
                out.add_bool(VALUE, info.has_shutter, true)?;
            }
            cmd::IMAGE_READY => {
                out.add_bool(VALUE, inner.exposure.image_ready(), true)?;
            }
            cmd::IS_PULSE_GUIDING => {
                out.add_bool(VALUE, false, true)?;
            }
            cmd::LAST_EXPOSURE_DURATION => {
                let Some(duration) = inner.exposure.last_duration() else {
                    return Err(Error::alpaca(
                        AlpacaStatus::ValueNotSet,
                        "No exposure has been taken",
                    ));
                };
                out.add_f64(VALUE, duration.as_secs_f64(), true)?;
            }
            cmd::LAST_EXPOSURE_START_TIME => {
                let Some(start) = inner.exposure.last_start() else {
                    return Err(Error::alpaca(
                        AlpacaStatus::ValueNotSet,
                        "No exposure has been taken",
                    ));
                };
                let text = start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
                out.add_string(VALUE, &text, true)?;
            }
            cmd::MAX_ADU => {
                out.add_u32(VALUE, info.max_adu, true)?;
            }
            cmd::MAX_BIN_X | cmd::MAX_BIN_Y => {
                out.add_u32(VALUE, info.max_bin, true)?;
            }
            cmd::NUM_X => match req.verb {
                Verb::Get => {
                    out.add_u32(VALUE, inner.frame.num_x, true)?;
                }
                Verb::Put => {
                    inner.frame.num_x = Self::non_negative(req, "NumX", 1)?;
                }
            },
            cmd::NUM_Y => match req.verb {
                Verb::Get => {
                    out.add_u32(VALUE, inner.frame.num_y, true)?;
                }
                Verb::Put => {
                    inner.frame.num_y = Self::non_negative(req, "NumY", 1)?;
                }
            },
            cmd::OFFSET => match req.verb {
                Verb::Get => {
                    out.add_i32(VALUE, inner.offset, true)?;
                }
                Verb::Put => {
                    inner.offset = Self::ranged(req, "Offset", info.offset_min, info.offset_max)?;
                }
            },
            cmd::OFFSET_MAX => {
                out.add_i32(VALUE, info.offset_max, true)?;
            }
            cmd::OFFSET_MIN => {
                out.add_i32(VALUE, info.offset_min, true)?;
            }
            cmd::PERCENT_COMPLETED => {
                out.add_i32(VALUE, inner.percent_completed(now), true)?;
            }
            cmd::PIXEL_SIZE_X => {
                out.add_f64(VALUE, info.pixel_size_x, true)?;
            }
            cmd::PIXEL_SIZE_Y => {
                out.add_f64(VALUE, info.pixel_size_y, true)?;
            }
            cmd::READOUT_MODE => match req.verb {
                Verb::Get => {
                    let mode = i32::try_from(inner.readout_mode).unwrap_or(0);
                    out.add_i32(VALUE, mode, true)?;
                }
                Verb::Put => {
                    let max = i32::try_from(info.readout_modes.len()).unwrap_or(1) - 1;
                    let mode = Self::ranged(req, "ReadoutMode", 0, max)?;
                    inner.readout_mode = usize::try_from(mode).unwrap_or(0);
                }
            },
            cmd::READOUT_MODES => {
                write_value(out, &info.readout_modes)?;
            }
            cmd::SENSOR_NAME => {
                out.add_string(VALUE, &info.name, true)?;
            }
            cmd::SENSOR_TYPE => {
                out.add_i32(VALUE, info.sensor_type, true)?;
            }
            cmd::SET_CCD_TEMPERATURE => {
                out.add_f64(VALUE, inner.target_temperature, true)?;
            }
            cmd::START_X => match req.verb {
                Verb::Get => {
                    out.add_u32(VALUE, inner.frame.start_x, true)?;
                }
                Verb::Put => {
                    inner.frame.start_x = Self::non_negative(req, "StartX", 0)?;
                }
            },
            cmd::START_Y => match req.verb {
                Verb::Get => {
                    out.add_u32(VALUE, inner.frame.start_y, true)?;
                }
                Verb::Put => {
                    inner.frame.start_y = Self::non_negative(req, "StartY", 0)?;
                }
            },
            cmd::PULSE_GUIDE => {
                return unsupported(AlpacaStatus::MethodNotImplemented, "PulseGuide");
            }
            cmd::START_EXPOSURE => {
                if inner.exposure.phase().is_busy() {
                    return Err(Error::alpaca(
                        AlpacaStatus::DeviceBusy,
                        "An exposure is already in progress",
                    ));
                }
                let request = self.exposure_request(inner, req)?;
                if inner.arm(request) {
                    tracing::info!(
                        device = %self.core.name(),
                        duration = ?request.duration,
                        light = request.light,
                        "exposure armed"
                    );
                }
            }
            cmd::STOP_EXPOSURE => match inner.exposure.phase() {
                Phase::Armed => inner.abort(),
                _ => inner.exposure.request_stop(),
            },
            cmd::EXPOSURE_PHASE => {
                out.add_string(VALUE, &inner.exposure.phase().to_string(), true)?;
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
        self.state_items(Instant::now())
    }

    // runs on the scheduler, so the sensor abort goes through the readout worker
    fn watchdog_timeout(&self) {
        let mut inner = lock(&self.inner);
        if !inner.exposure.phase().is_busy() {
            return;
        }
        tracing::warn!(device = %self.core.name(), "watchdog aborting exposure");
        inner.abort();
        inner.abort_sensor = true;
    }

    fn set_connected(&self, connected: bool) -> Result<()> {
        if connected {
            self.sensor().open()?;
        } else {
            self.sensor().close()?;
        }
        self.core.set_connected(connected);
        Ok(())
    }
}
