//! Per-connection request handling
//!
//! Runs on a blocking worker thread: read one request, dispatch it to the
//! addressed device or the management endpoint, write the response, close.

use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpStream};

use super::{ServerSettings, management};
use crate::device::write_trailer;
use crate::protocol::{AlpacaStatus, DeviceType};
use crate::registry::Registry;
use crate::request::{Request, RequestKind};
use crate::Error;
use crate::wire::{JsonEncoder, write_bad_request};

/// Serve one connection to completion
pub fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &Registry,
    settings: &ServerSettings,
) {
    if let Err(e) = serve(&stream, peer, registry, settings) {
        tracing::warn!(%peer, error = %e, "connection dropped");
    }
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        tracing::debug!(%peer, error = %e, "connection already closed");
    }
}

fn serve(
    stream: &TcpStream,
    peer: SocketAddr,
    registry: &Registry,
    settings: &ServerSettings,
) -> io::Result<()> {
    stream.set_read_timeout(Some(settings.io_timeout))?;
    stream.set_write_timeout(Some(settings.io_timeout))?;

    let mut reader = BufReader::new(stream);
    let mut sink = stream;
    match Request::read_from(&mut reader, peer) {
        Ok(req) => {
            let mut out =
                JsonEncoder::new(&mut sink, settings.buffer_capacity, &settings.server_name);
            dispatch(registry, settings, &req, &mut out)?;
            Ok(())
        }
        Err(Error::BadRequest(reason)) => {
            tracing::debug!(%peer, %reason, "bad request");
            write_bad_request(&mut sink, &reason)?;
            Ok(())
        }
        Err(Error::Io(e)) => Err(e),
        Err(e) => Err(io::Error::other(e.to_string())),
    }
}

/// Route a parsed request and write the complete response
///
/// # Errors
///
/// Returns an error only when the response cannot be written
pub fn dispatch(
    registry: &Registry,
    settings: &ServerSettings,
    req: &Request,
    out: &mut JsonEncoder<'_>,
) -> io::Result<AlpacaStatus> {
    tracing::debug!(
        peer = %req.peer,
        verb = %req.verb,
        device_type = %req.device_type,
        device_number = %req.device_number,
        command = %req.command,
        client_id = req.client_id,
        user_agent = ?req.user_agent,
        "request"
    );

    match req.kind {
        RequestKind::Api => {}
        RequestKind::Management => return management::handle(registry, settings, req, out),
        RequestKind::Setup | RequestKind::Other => {
            return write_error(
                registry,
                req,
                out,
                AlpacaStatus::NotImplemented,
                "Only /api and /management requests are served",
            );
        }
    }

    let device = req
        .device_type
        .parse::<DeviceType>()
        .ok()
        .zip(req.number())
        .and_then(|(device_type, number)| registry.lookup(device_type, number));
    let Some(device) = device else {
        let message = format!("Device not found: {}/{}", req.device_type, req.device_number);
        return write_error(registry, req, out, AlpacaStatus::NotImplemented, &message);
    };

    let outcome = device.process_command(req, out, registry.next_transaction_id())?;
    if let Some(id) = outcome.id {
        registry.record_command_stat(device.as_ref(), id, req.verb, outcome.status);
    }
    if outcome.status.is_success() {
        registry.wake_scheduler();
    }
    Ok(outcome.status)
}

fn write_error(
    registry: &Registry,
    req: &Request,
    out: &mut JsonEncoder<'_>,
    status: AlpacaStatus,
    message: &str,
) -> io::Result<AlpacaStatus> {
    out.create_header();
    write_trailer(
        out,
        req.client_transaction_id,
        registry.next_transaction_id(),
        status,
        message,
    )?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::{Device, DeviceCore};
    use crate::protocol::{Access, CommandEntry, CommandTable, VALUE, Verb};
    use crate::registry::RegistryBuilder;
    use crate::request::Params;
    use crate::wire::DEFAULT_CAPACITY;

    static ENTRIES: [CommandEntry; 2] = [
        CommandEntry::new("position", 0, Access::Get),
        CommandEntry::new("explode", 1, Access::Put),
    ];
    static TABLE: CommandTable = CommandTable::new(&ENTRIES);

    struct Focuser(DeviceCore);

    impl Device for Focuser {
        fn core(&self) -> &DeviceCore {
            &self.0
        }

        fn commands(&self) -> &'static CommandTable {
            &TABLE
        }

        fn handle_command(
            &self,
            cmd: &CommandEntry,
            _req: &Request,
            out: &mut JsonEncoder<'_>,
        ) -> crate::Result<()> {
            if cmd.id == 1 {
                panic!("handler bug");
            }
            out.add_i32(VALUE, 1200, true)?;
            Ok(())
        }
    }

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        let focuser = Focuser(DeviceCore::new(DeviceType::Focuser, "focuser"));
        builder.register(Arc::new(focuser));
        builder.build()
    }

    fn call(registry: &Registry, verb: Verb, path: &str, params: &str) -> serde_json::Value {
        let peer = "127.0.0.1:9".parse().unwrap();
        let req = Request::from_path(peer, verb, path, Params::parse(params));
        let settings = ServerSettings::default();
        let mut raw = Vec::new();
        let mut out = JsonEncoder::new(&mut raw, DEFAULT_CAPACITY, "test");
        dispatch(registry, &settings, &req, &mut out).unwrap();
        let text = String::from_utf8(raw).unwrap();
        serde_json::from_str(text.split_once("\r\n\r\n").unwrap().1).unwrap()
    }

    #[test]
    fn routes_to_the_device() {
        let registry = registry();
        let body = call(
            &registry,
            Verb::Get,
            "/api/v1/focuser/0/position",
            "ClientTransactionID=9",
        );
        assert_eq!(body["Value"], 1200);
        assert_eq!(body["ClientTransactionID"], 9);
        assert_eq!(body["ErrorNumber"], 0);
        assert_eq!(body["ErrorMessage"], "");
    }

    #[test]
    fn unknown_device_is_not_implemented() {
        let registry = registry();
        let body = call(&registry, Verb::Get, "/api/v1/focuser/3/position", "");
        assert_eq!(body["ErrorNumber"], 0x400);
        assert_eq!(body["ErrorMessage"], "Device not found: focuser/3");

        let body = call(&registry, Verb::Get, "/api/v1/toaster/0/position", "");
        assert_eq!(body["ErrorMessage"], "Device not found: toaster/0");
    }

    #[test]
    fn unknown_command_is_not_implemented() {
        let registry = registry();
        let body = call(&registry, Verb::Get, "/api/v1/focuser/0/teleport", "");
        assert_eq!(body["ErrorNumber"], 0x400);
        assert_eq!(body["ErrorMessage"], "'teleport' is not a recognized command");
    }

    #[test]
    fn handler_panic_becomes_internal_error() {
        let registry = registry();
        let body = call(&registry, Verb::Put, "/api/v1/focuser/0/explode", "");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InternalError.code());
        assert!(body["ErrorMessage"].as_str().unwrap().contains("handler bug"));

        let body = call(&registry, Verb::Get, "/api/v1/focuser/0/position", "");
        assert_eq!(body["ErrorNumber"], 0);
    }

    #[test]
    fn management_lists_devices() {
        let registry = registry();
        let body = call(&registry, Verb::Get, "/management/v1/configureddevices", "");
        assert_eq!(body["Value"][0]["DeviceType"], "Focuser");
        assert_eq!(body["Value"][0]["DeviceNumber"], 0);
        assert_eq!(body["Value"][0]["DeviceName"], "focuser");

        let body = call(&registry, Verb::Get, "/management/apiversions", "");
        assert_eq!(body["Value"], serde_json::json!([1]));

        let body = call(&registry, Verb::Get, "/management/v1/description", "");
        assert!(body["Value"]["ServerName"].is_string());
    }

    #[test]
    fn connection_is_closed_after_one_response() {
        use std::io::{Read, Write};

        let registry = registry();
        let settings = ServerSettings::default();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        client
            .write_all(b"GET /api/v1/focuser/0/position HTTP/1.1\r\n\r\n")
            .unwrap();
        handle_connection(stream, peer, &registry, &settings);
        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();
        let body: serde_json::Value =
            serde_json::from_str(response.split_once("\r\n\r\n").unwrap().1).unwrap();
        assert_eq!(body["Value"], 1200);

        // a client that hung up early only costs a log line
        drop(TcpStream::connect(addr).unwrap());
        let (stream, peer) = listener.accept().unwrap();
        handle_connection(stream, peer, &registry, &settings);
    }

    #[test]
    fn server_transaction_ids_increase_across_requests() {
        let registry = registry();
        let first = call(&registry, Verb::Get, "/api/v1/focuser/0/position", "");
        let second = call(&registry, Verb::Get, "/management/apiversions", "");
        let third = call(&registry, Verb::Get, "/api/v1/focuser/9/position", "");
        let ids: Vec<u64> = [first, second, third]
            .iter()
            .map(|b| b["ServerTransactionID"].as_u64().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
