//! Sensor calls made off the scheduler
//!
//! Starting, polling and downloading an exposure can take as long as the
//! sensor likes. A worker thread owned by the camera makes those calls one
//! at a time and parks each reply in a slot; the scheduler only checks the
//! `ready` flag and picks the reply up on a later step.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Instant;

use super::{CameraSensor, ExposureRequest, Image};
use crate::devices::lock;
use crate::{Error, Result};

/// Sensor shared between the worker and the command handlers
pub type SharedSensor = Arc<Mutex<Box<dyn CameraSensor>>>;

/// One blocking sensor operation
#[derive(Debug, Clone, Copy)]
pub enum Call {
    Start(ExposureRequest),
    Poll,
    Read,
    Abort,
}

/// What the sensor answered
pub enum Reply {
    Started(Result<()>),
    Exposing(Result<bool>),
    Image(Result<Image>),
    Aborted(Result<()>),
}

/// A finished call
pub struct Done {
    /// Exposure the call belonged to
    pub exposure: u64,
    /// Time passed to the sensor
    pub at: Instant,
    pub reply: Reply,
}

struct Job {
    exposure: u64,
    at: Instant,
    call: Call,
}

#[derive(Default)]
struct Mailbox {
    ready: AtomicBool,
    slot: Mutex<Option<Done>>,
}

/// Handle to a camera's readout worker
pub struct Readout {
    jobs: mpsc::Sender<Job>,
    mailbox: Arc<Mailbox>,
    pending: bool,
}

impl Readout {
    /// Start the worker thread for `sensor`
    ///
    /// The thread exits when the handle is dropped
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn(name: &str, sensor: SharedSensor) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let mailbox = Arc::new(Mailbox::default());
        let worker = Arc::clone(&mailbox);
        thread::Builder::new()
            .name(format!("{name} readout"))
            .spawn(move || {
                for job in queue {
                    let reply = run(&sensor, job.call, job.at);
                    *lock(&worker.slot) = Some(Done {
                        exposure: job.exposure,
                        at: job.at,
                        reply,
                    });
                    worker.ready.store(true, Ordering::Release);
                }
            })?;
        Ok(Self {
            jobs,
            mailbox,
            pending: false,
        })
    }

    /// Whether a call is still running on the sensor
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pending && !self.mailbox.ready.load(Ordering::Acquire)
    }

    /// Queue `call` for `exposure`
    ///
    /// # Errors
    ///
    /// Returns `Error::Hardware` if the worker has stopped
    pub fn submit(&mut self, exposure: u64, call: Call, at: Instant) -> Result<()> {
        self.jobs
            .send(Job { exposure, at, call })
            .map_err(|_| Error::Hardware("camera readout worker stopped".to_string()))?;
        self.pending = true;
        Ok(())
    }

    /// Take the reply of the last call once it has arrived
    pub fn take(&mut self) -> Option<Done> {
        if !self.pending || !self.mailbox.ready.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.pending = false;
        lock(&self.mailbox.slot).take()
    }
}

fn run(sensor: &SharedSensor, call: Call, at: Instant) -> Reply {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut guard = lock(sensor);
        let sensor = &mut **guard;
        match call {
            Call::Start(request) => Reply::Started(sensor.start_exposure(&request, at)),
            Call::Poll => Reply::Exposing(sensor.is_exposing(at)),
            Call::Read => Reply::Image(sensor.read_image(at)),
            Call::Abort => Reply::Aborted(sensor.abort()),
        }
    }));
    outcome.unwrap_or_else(|_| {
        let e = Error::Hardware("sensor call panicked".to_string());
        match call {
            Call::Start(_) => Reply::Started(Err(e)),
            Call::Poll => Reply::Exposing(Err(e)),
            Call::Read => Reply::Image(Err(e)),
            Call::Abort => Reply::Aborted(Err(e)),
        }
    })
}
