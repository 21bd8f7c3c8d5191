//! Handlers for the commands every device understands

use serde::Serialize;

use super::{Counters, Device, write_value};
use crate::protocol::command::common;
use crate::protocol::{AlpacaStatus, CommandEntry, INTERFACE_VERSION, VALUE, Verb};
use crate::request::Request;
use crate::wire::JsonEncoder;
use crate::{BUILD_NUMBER, Error, Result, VERSION};

#[derive(Serialize)]
struct CommandRow<'a> {
    #[serde(rename = "Command")]
    command: &'a str,
    #[serde(flatten)]
    counters: Counters,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatsReport<'a> {
    total: Counters,
    commands: Vec<CommandRow<'a>>,
}

/// Driver version string, `"<version> Build <n>"`
#[must_use]
pub fn driver_version() -> String {
    format!("{VERSION} Build {BUILD_NUMBER}")
}

/// Run one of the shared commands for `device`
///
/// # Errors
///
/// Returns the protocol status for unsupported or invalid requests
pub fn handle<D: Device + ?Sized>(
    device: &D,
    cmd: &CommandEntry,
    req: &Request,
    out: &mut JsonEncoder<'_>,
) -> Result<()> {
    let core = device.core();
    match cmd.id {
        common::ACTION => Err(Error::alpaca(
            AlpacaStatus::ActionNotImplemented,
            format!(
                "Action '{}' is not implemented",
                req.params.get("Action").unwrap_or_default()
            ),
        )),
        common::COMMAND_BLIND | common::COMMAND_BOOL | common::COMMAND_STRING => Err(
            Error::alpaca(
                AlpacaStatus::MethodNotImplemented,
                format!("'{}' is not implemented", cmd.keyword),
            ),
        ),
        common::CONNECTED => match req.verb {
            Verb::Get => {
                out.add_bool(VALUE, core.is_connected(), true)?;
                Ok(())
            }
            Verb::Put => {
                let connected = req.params.bool("Connected")?;
                set_connected(device, connected)
            }
        },
        common::CONNECT => set_connected(device, true),
        common::DISCONNECT => set_connected(device, false),
        common::CONNECTING => {
            out.add_bool(VALUE, false, true)?;
            Ok(())
        }
        common::DEVICE_STATE => write_value(out, &device.device_state()),
        common::DESCRIPTION => {
            out.add_string(VALUE, core.description(), true)?;
            Ok(())
        }
        common::DRIVER_INFO => {
            out.add_string(VALUE, core.driver_info(), true)?;
            Ok(())
        }
        common::DRIVER_VERSION => {
            out.add_string(VALUE, &driver_version(), true)?;
            Ok(())
        }
        common::INTERFACE_VERSION => {
            out.add_i32(VALUE, INTERFACE_VERSION, true)?;
            Ok(())
        }
        common::NAME => {
            out.add_string(VALUE, core.name(), true)?;
            Ok(())
        }
        common::SUPPORTED_ACTIONS => write_value(out, &device.commands().supported_actions()),
        common::COMMAND_STATS => {
            let table = device.commands();
            let report = {
                let stats = core.stats();
                StatsReport {
                    total: stats.total(),
                    commands: stats
                        .iter()
                        .filter_map(|(id, counters)| {
                            table.keyword_by_id(id).map(|(command, _)| CommandRow {
                                command,
                                counters,
                            })
                        })
                        .collect(),
                }
            };
            write_value(out, &report)
        }
        _ => Err(Error::not_implemented(format!(
            "'{}' is not a recognized command",
            cmd.keyword
        ))),
    }
}

fn set_connected<D: Device + ?Sized>(device: &D, connected: bool) -> Result<()> {
    device.set_connected(connected)?;
    tracing::info!(device = %device.core().name(), connected, "connection state changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCore;
    use crate::protocol::{Access, CommandTable, DeviceType};
    use crate::request::Params;
    use crate::wire::{DEFAULT_CAPACITY, StateItem};

    static ENTRIES: [CommandEntry; 1] = [CommandEntry::new("ping", 0, Access::Get)];
    static TABLE: CommandTable = CommandTable::new(&ENTRIES);

    struct Switchboard {
        core: DeviceCore,
    }

    impl Device for Switchboard {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        fn commands(&self) -> &'static CommandTable {
            &TABLE
        }

        fn handle_command(
            &self,
            _cmd: &CommandEntry,
            _req: &Request,
            out: &mut JsonEncoder<'_>,
        ) -> Result<()> {
            out.add_string(VALUE, "pong", true)?;
            Ok(())
        }

        fn device_state(&self) -> Vec<StateItem> {
            vec![StateItem::new("Pings", 3)]
        }
    }

    fn run(switchboard: &Switchboard, verb: Verb, command: &str, params: &str) -> serde_json::Value {
        let req = Request::from_path(
            "127.0.0.1:1".parse().unwrap(),
            verb,
            &format!("/api/v1/switch/0/{command}"),
            Params::parse(params),
        );
        let mut raw = Vec::new();
        let mut out = JsonEncoder::new(&mut raw, DEFAULT_CAPACITY, "test");
        let outcome = switchboard.process_command(&req, &mut out, 1).unwrap();
        switchboard
            .core()
            .record_command(outcome.id.unwrap_or(u16::MAX), verb, outcome.status);
        let text = String::from_utf8(raw).unwrap();
        serde_json::from_str(text.split_once("\r\n\r\n").unwrap().1).unwrap()
    }

    fn switchboard() -> Switchboard {
        Switchboard {
            core: DeviceCore::new(DeviceType::Switch, "switchboard"),
        }
    }

    #[test]
    fn connected_round_trips_through_put() {
        let p = switchboard();
        let body = run(&p, Verb::Put, "connected", "Connected=False");
        assert_eq!(body["ErrorNumber"], 0);
        assert_eq!(run(&p, Verb::Get, "connected", "")["Value"], false);

        let body = run(&p, Verb::Put, "connected", "Connected=sometimes");
        assert_eq!(body["ErrorNumber"], AlpacaStatus::InvalidValue.code());
    }

    #[test]
    fn action_and_command_family_are_not_implemented() {
        let p = switchboard();
        let body = run(&p, Verb::Put, "action", "Action=focus");
        assert_eq!(body["ErrorNumber"], 0x40C);
        assert_eq!(run(&p, Verb::Put, "commandblind", "")["ErrorNumber"], 0x400);
    }

    #[test]
    fn wrong_verb_is_invalid_operation() {
        let p = switchboard();
        let body = run(&p, Verb::Put, "name", "");
        assert_eq!(body["ErrorNumber"], 0x40B);
        assert_eq!(body["ErrorMessage"], "PUT not supported for 'name'");
    }

    #[test]
    fn supported_actions_and_device_state() {
        let p = switchboard();
        let actions = run(&p, Verb::Get, "supportedactions", "");
        assert!(actions["Value"].as_array().unwrap().contains(&"ping".into()));

        let state = run(&p, Verb::Get, "devicestate", "");
        assert_eq!(state["Value"][0]["Name"], "Pings");
        assert_eq!(state["Value"][0]["Value"], 3);
    }

    #[test]
    fn command_stats_name_each_command() {
        let p = switchboard();
        run(&p, Verb::Get, "ping", "");
        run(&p, Verb::Get, "ping", "");
        let stats = run(&p, Verb::Get, "commandstats", "");
        let rows = stats["Value"]["Commands"].as_array().unwrap();
        let ping = rows.iter().find(|r| r["Command"] == "ping").unwrap();
        assert_eq!(ping["Gets"], 2);
        assert_eq!(stats["Value"]["Total"]["Connections"], 2);
    }

    #[test]
    fn driver_version_includes_build() {
        assert!(driver_version().contains(" Build "));
    }
}
