//! `/management` endpoint: API versions, server description, device list

use std::io;

use serde::Serialize;

use super::ServerSettings;
use crate::device::write_trailer;
use crate::protocol::{API_VERSION, AlpacaStatus, ConfiguredDevice, VALUE, Verb};
use crate::registry::Registry;
use crate::request::Request;
use crate::wire::JsonEncoder;
use crate::{Error, Result};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Description<'a> {
    server_name: &'a str,
    manufacturer: &'a str,
    manufacturer_version: &'a str,
    location: &'a str,
}

/// Device list in registration order
#[must_use]
pub fn configured_devices(registry: &Registry) -> Vec<ConfiguredDevice> {
    registry
        .devices()
        .iter()
        .map(|d| {
            let core = d.core();
            ConfiguredDevice {
                device_name: core.name().to_string(),
                device_type: core.device_type().name().to_string(),
                device_number: core.number(),
                unique_id: core.unique_id().to_string(),
            }
        })
        .collect()
}

/// Answer a management request with the standard trailer
///
/// # Errors
///
/// Returns an error only when the socket write fails
pub fn handle(
    registry: &Registry,
    settings: &ServerSettings,
    req: &Request,
    out: &mut JsonEncoder<'_>,
) -> io::Result<AlpacaStatus> {
    out.create_header();
    let result = if req.verb == Verb::Get {
        write_value(registry, settings, req, out)
    } else {
        Err(Error::invalid_operation(format!(
            "{} not supported for '{}'",
            req.verb, req.command
        )))
    };

    let (status, message) = match result {
        Ok(()) => (AlpacaStatus::Success, String::new()),
        Err(Error::Io(e)) => return Err(e),
        Err(e) => e.to_status(),
    };
    write_trailer(
        out,
        req.client_transaction_id,
        registry.next_transaction_id(),
        status,
        &message,
    )?;
    Ok(status)
}

fn write_value(
    registry: &Registry,
    settings: &ServerSettings,
    req: &Request,
    out: &mut JsonEncoder<'_>,
) -> Result<()> {
    match req.command.to_ascii_lowercase().as_str() {
        "apiversions" => {
            out.add_serialized(VALUE, &[API_VERSION], true)?;
        }
        "description" => {
            let description = Description {
                server_name: &settings.server_name,
                manufacturer: &settings.manufacturer,
                manufacturer_version: crate::VERSION,
                location: &settings.location,
            };
            out.add_serialized(VALUE, &description, true)?;
        }
        "configureddevices" => {
            out.add_serialized(VALUE, &configured_devices(registry), true)?;
        }
        _ => {
            return Err(Error::not_implemented(format!(
                "'{}' is not a recognized management command",
                req.command
            )));
        }
    }
    Ok(())
}
