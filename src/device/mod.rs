//! Device driver contract
//!
//! Every device kind implements [`Device`]. The provided
//! [`Device::process_command`] owns the response framing: it resolves the
//! command, checks the verb, runs the device or common handler, records
//! statistics and writes the standard trailer. Handlers only produce the
//! command-specific fields and a status.

pub mod common;
pub mod core;
pub mod stats;

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

pub use self::core::{DEFAULT_WATCHDOG, DeviceCore, Identity};
pub use stats::{CommandStats, Counters};

use crate::discovery::DiscoveredDevice;
use crate::protocol::{AlpacaStatus, CommandEntry, CommandTable};
use crate::request::Request;
use crate::wire::{JsonEncoder, StateItem};
use crate::{Error, Result};

/// Delay returned by devices without a state machine
pub const IDLE_POLL: Duration = Duration::from_secs(5);

/// Result of one dispatched command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Table id of the command, `None` when the keyword was not found
    pub id: Option<u16>,
    pub status: AlpacaStatus,
}

/// A network-addressable device
pub trait Device: Send + Sync {
    /// Common properties, statistics and watchdog
    fn core(&self) -> &DeviceCore;

    /// Device-specific command table
    fn commands(&self) -> &'static CommandTable;

    /// Run a device-specific command, writing its fields with trailing commas
    ///
    /// # Errors
    ///
    /// Returns `Error::Alpaca` for protocol failures; any other error is
    /// reported as `InternalError`
    fn handle_command(
        &self,
        cmd: &CommandEntry,
        req: &Request,
        out: &mut JsonEncoder<'_>,
    ) -> Result<()>;

    /// Dispatch a request and write the complete response
    ///
    /// # Errors
    ///
    /// Returns an error only when the socket write fails
    fn process_command(
        &self,
        req: &Request,
        out: &mut JsonEncoder<'_>,
        server_transaction_id: u32,
    ) -> io::Result<CommandOutcome> {
        out.create_header();

        let entry = self.commands().find(&req.command);
        let result = match entry {
            None => Err(Error::not_implemented(format!(
                "'{}' is not a recognized command",
                req.command
            ))),
            Some(cmd) if !cmd.access.allows(req.verb) => Err(Error::invalid_operation(format!(
                "{} not supported for '{}'",
                req.verb, req.command
            ))),
            Some(cmd) => run_guarded(|| {
                if cmd.id >= crate::protocol::command::common::FIRST {
                    common::handle(self, cmd, req, out)
                } else {
                    self.handle_command(cmd, req, out)
                }
            }),
        };

        let (status, message) = match result {
            Ok(()) => (AlpacaStatus::Success, String::new()),
            Err(Error::Io(e)) => return Err(e),
            Err(e) => {
                let (status, message) = e.to_status();
                tracing::debug!(
                    device = %self.core().name(),
                    command = %req.command,
                    %status,
                    %message,
                    "command failed"
                );
                (status, message)
            }
        };

        write_trailer(
            out,
            req.client_transaction_id,
            server_transaction_id,
            status,
            &message,
        )?;
        Ok(CommandOutcome {
            id: entry.map(|e| e.id),
            status,
        })
    }

    /// Advance the state machine one step, returning the wanted delay
    fn run_state_machine(&self) -> Duration {
        IDLE_POLL
    }

    /// Receive a peer found by a discovery run
    fn process_discovery(&self, _peer: &DiscoveredDevice) {}

    /// Whether the daemon should start a discovery run for this device
    fn wants_discovery(&self) -> bool {
        false
    }

    /// Named properties reported by `devicestate` and `readall`
    fn device_state(&self) -> Vec<StateItem> {
        Vec::new()
    }

    /// Called once when the command watchdog expires
    fn watchdog_timeout(&self) {}

    /// Connect or disconnect the hardware behind this device
    ///
    /// # Errors
    ///
    /// Returns an error when the hardware cannot be opened or closed
    fn set_connected(&self, connected: bool) -> Result<()> {
        self.core().set_connected(connected);
        Ok(())
    }
}

/// Run a handler, converting a panic into `InternalError`
fn run_guarded(f: impl FnOnce() -> Result<()>) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(%reason, "command handler panicked");
        Err(Error::alpaca(
            AlpacaStatus::InternalError,
            format!("internal error: {reason}"),
        ))
    })
}

/// Write the fixed response trailer and finish the response
///
/// # Errors
///
/// Returns the socket error if the write fails
pub fn write_trailer(
    out: &mut JsonEncoder<'_>,
    client_transaction_id: u32,
    server_transaction_id: u32,
    status: AlpacaStatus,
    message: &str,
) -> io::Result<()> {
    out.add_u32("ClientTransactionID", client_transaction_id, true)?;
    out.add_u32("ServerTransactionID", server_transaction_id, true)?;
    out.add_i32("ErrorNumber", status.code(), true)?;
    out.add_string("ErrorMessage", message, false)?;
    out.finish(true)?;
    Ok(())
}

/// Write the command's `Value` field
///
/// # Errors
///
/// Returns the socket error if the write fails
pub fn write_value<T: serde::Serialize + ?Sized>(
    out: &mut JsonEncoder<'_>,
    value: &T,
) -> Result<()> {
    out.add_serialized(crate::protocol::VALUE, value, true)?;
    Ok(())
}
