//! Shutter served by another Alpaca server
//!
//! A dome without a shutter of its own drives the first `Shutter` found by
//! discovery. Commands are forwarded as form PUTs and wait for the peer's
//! answer; they run on a request worker, never on the scheduler. The
//! peer's `readall` is polled on a spawned task and cached so the dome's
//! step only reads the last answer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::runtime::Handle;

use crate::devices::{ShutterStatus, lock};
use crate::discovery::DiscoveredDevice;
use crate::protocol::AlpacaStatus;
use crate::{Error, Result};

/// Poll period while the shutter is still
const POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Poll period while the shutter is travelling
const MOVING_POLL_INTERVAL: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// `ClientID` sent with every forwarded request
const CLIENT_ID: u32 = 1;

/// Shutter commands a dome forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterCommand {
    Open,
    Close,
    Abort,
}

impl ShutterCommand {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Open => "openshutter",
            Self::Close => "closeshutter",
            Self::Abort => "abortslew",
        }
    }
}

#[derive(Debug, Default)]
struct Cache {
    status: Option<ShutterStatus>,
    altitude: Option<f64>,
    last_poll: Option<Instant>,
}

/// Whether a poll is due at `now`
#[must_use]
pub fn poll_due(last_poll: Option<Instant>, now: Instant, moving: bool) -> bool {
    let interval = if moving {
        MOVING_POLL_INTERVAL
    } else {
        POLL_INTERVAL
    };
    last_poll.is_none_or(|last| now.saturating_duration_since(last) >= interval)
}

/// Handle to a discovered shutter
pub struct RemoteShutter {
    peer: DiscoveredDevice,
    client: reqwest::Client,
    cache: Mutex<Cache>,
    polling: AtomicBool,
    transaction: AtomicU32,
}

impl RemoteShutter {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(peer: DiscoveredDevice) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            peer,
            client,
            cache: Mutex::new(Cache::default()),
            polling: AtomicBool::new(false),
            transaction: AtomicU32::new(1),
        })
    }

    #[must_use]
    pub const fn peer(&self) -> &DiscoveredDevice {
        &self.peer
    }

    /// Address of the peer's Alpaca listener
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer.address, self.peer.port)
    }

    /// Last status read from the peer
    #[must_use]
    pub fn status(&self) -> Option<ShutterStatus> {
        lock(&self.cache).status
    }

    /// Last altitude read from the peer
    #[must_use]
    pub fn altitude(&self) -> Option<f64> {
        lock(&self.cache).altitude
    }

    fn url(&self, command: &str) -> String {
        format!(
            "http://{}/api/v1/shutter/{}/{command}",
            self.addr(),
            self.peer.device_number
        )
    }

    fn client_params(&self) -> [(&'static str, String); 2] {
        let transaction = self.transaction.fetch_add(1, Ordering::Relaxed);
        [
            ("ClientID", CLIENT_ID.to_string()),
            ("ClientTransactionID", transaction.to_string()),
        ]
    }

    /// Forward `command` and wait for the peer's answer
    ///
    /// Must be called from a blocking thread inside the runtime
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the peer cannot be reached, or the peer's
    /// own status if it refused the command
    pub fn command(&self, command: ShutterCommand) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| {
            Error::alpaca(
                AlpacaStatus::NotConnected,
                "Remote shutter needs the async runtime",
            )
        })?;
        handle.block_on(self.send(command))
    }

    /// Forward `command` on a spawned task, logging the outcome
    pub fn spawn_command(self: &Arc<Self>, command: ShutterCommand) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(command = command.keyword(), "no runtime to reach the remote shutter");
            return;
        };
        let remote = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = remote.send(command).await {
                tracing::warn!(
                    peer = %remote.addr(),
                    command = command.keyword(),
                    error = %e,
                    "remote shutter command failed"
                );
            }
        });
    }

    /// PUT `command` to the peer
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the peer cannot be reached, or the peer's
    /// own status if it refused the command
    pub async fn send(&self, command: ShutterCommand) -> Result<()> {
        let reply: Value = self
            .client
            .put(self.url(command.keyword()))
            .form(&self.client_params())
            .send()
            .await
            .map_err(peer_unreachable)?
            .json()
            .await
            .map_err(peer_unreachable)?;
        check_reply(&reply)?;
        // read the new position on the next step
        lock(&self.cache).last_poll = None;
        tracing::debug!(peer = %self.addr(), command = command.keyword(), "remote shutter command sent");
        Ok(())
    }

    /// Start a status poll if one is due and none is running
    ///
    /// Never waits on the network; without a runtime nothing is polled
    pub fn refresh(self: &Arc<Self>, now: Instant, moving: bool) {
        if !poll_due(lock(&self.cache).last_poll, now, moving) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if self.polling.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.cache).last_poll = Some(now);
        let remote = Arc::clone(self);
        handle.spawn(async move {
            match remote.read_status().await {
                Ok((status, altitude)) => {
                    let mut cache = lock(&remote.cache);
                    cache.status = status.or(cache.status);
                    cache.altitude = altitude.or(cache.altitude);
                }
                Err(e) => {
                    tracing::warn!(peer = %remote.addr(), error = %e, "remote shutter poll failed");
                }
            }
            remote.polling.store(false, Ordering::Release);
        });
    }

    async fn read_status(&self) -> Result<(Option<ShutterStatus>, Option<f64>)> {
        let reply: Value = self
            .client
            .get(self.url("readall"))
            .query(&self.client_params())
            .send()
            .await
            .map_err(peer_unreachable)?
            .json()
            .await
            .map_err(peer_unreachable)?;
        check_reply(&reply)?;
        let status = field(&reply, "ShutterStatus")
            .and_then(Value::as_i64)
            .and_then(ShutterStatus::from_code);
        let altitude = field(&reply, "Altitude").and_then(Value::as_f64);
        Ok((status, altitude))
    }
}

fn peer_unreachable(e: reqwest::Error) -> Error {
    Error::alpaca(
        AlpacaStatus::NotConnected,
        format!("Remote shutter unreachable: {e}"),
    )
}

/// Look up `key` in a reply object, ignoring case
fn field<'a>(reply: &'a Value, key: &str) -> Option<&'a Value> {
    reply
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Turn a non-zero `ErrorNumber` into the matching error
///
/// # Errors
///
/// Returns the peer's status and message when `ErrorNumber` is not zero
pub fn check_reply(reply: &Value) -> Result<()> {
    let code = field(reply, "ErrorNumber")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    if code == 0 {
        return Ok(());
    }
    let message = field(reply, "ErrorMessage")
        .and_then(Value::as_str)
        .unwrap_or("remote shutter refused the command");
    Err(Error::alpaca(AlpacaStatus::from_code(code), message))
}
