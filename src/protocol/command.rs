//! Static per-device-type command routing tables
//!
//! Every device type owns one `'static` table mapping a command keyword to
//! an integer id and the verbs it accepts. Commands shared by all devices
//! live in [`COMMON_COMMANDS`] and are searched after the device table.
//! Entries whose keyword starts with `-` are separators and never listed in
//! `supportedactions`.

use std::fmt;

/// Request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
}

impl Verb {
    /// Single-letter form used in stats rendering
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Get => 'G',
            Self::Put => 'P',
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        })
    }
}

/// Verbs a command accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Get,
    Put,
    Both,
}

impl Access {
    /// Whether a request with `verb` may run this command
    #[must_use]
    pub const fn allows(self, verb: Verb) -> bool {
        matches!(
            (self, verb),
            (Self::Both, _) | (Self::Get, Verb::Get) | (Self::Put, Verb::Put)
        )
    }
}

/// One row of a command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub keyword: &'static str,
    pub id: u16,
    pub access: Access,
}

impl CommandEntry {
    #[must_use]
    pub const fn new(keyword: &'static str, id: u16, access: Access) -> Self {
        Self {
            keyword,
            id,
            access,
        }
    }

    /// Separator rows such as `--extras`
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.keyword.starts_with('-')
    }
}

/// Ids of the commands every device understands
pub mod common {
    pub const ACTION: u16 = 1000;
    pub const COMMAND_BLIND: u16 = 1001;
    pub const COMMAND_BOOL: u16 = 1002;
    pub const COMMAND_STRING: u16 = 1003;
    pub const CONNECTED: u16 = 1004;
    pub const CONNECT: u16 = 1005;
    pub const CONNECTING: u16 = 1006;
    pub const DISCONNECT: u16 = 1007;
    pub const DEVICE_STATE: u16 = 1008;
    pub const DESCRIPTION: u16 = 1009;
    pub const DRIVER_INFO: u16 = 1010;
    pub const DRIVER_VERSION: u16 = 1011;
    pub const INTERFACE_VERSION: u16 = 1012;
    pub const NAME: u16 = 1013;
    pub const SUPPORTED_ACTIONS: u16 = 1014;
    pub const EXTRAS: u16 = 1015;
    pub const COMMAND_STATS: u16 = 1016;

    /// First common id; everything below belongs to a device table
    pub const FIRST: u16 = ACTION;
}

/// Commands shared by every device type
pub static COMMON_COMMANDS: [CommandEntry; 17] = [
    CommandEntry::new("action", common::ACTION, Access::Put),
    CommandEntry::new("commandblind", common::COMMAND_BLIND, Access::Put),
    CommandEntry::new("commandbool", common::COMMAND_BOOL, Access::Put),
    CommandEntry::new("commandstring", common::COMMAND_STRING, Access::Put),
    CommandEntry::new("connected", common::CONNECTED, Access::Both),
    CommandEntry::new("connect", common::CONNECT, Access::Put),
    CommandEntry::new("connecting", common::CONNECTING, Access::Get),
    CommandEntry::new("disconnect", common::DISCONNECT, Access::Put),
    CommandEntry::new("devicestate", common::DEVICE_STATE, Access::Get),
    CommandEntry::new("description", common::DESCRIPTION, Access::Get),
    CommandEntry::new("driverinfo", common::DRIVER_INFO, Access::Get),
    CommandEntry::new("driverversion", common::DRIVER_VERSION, Access::Get),
    CommandEntry::new("interfaceversion", common::INTERFACE_VERSION, Access::Get),
    CommandEntry::new("name", common::NAME, Access::Get),
    CommandEntry::new("supportedactions", common::SUPPORTED_ACTIONS, Access::Get),
    CommandEntry::new("--extras", common::EXTRAS, Access::Get),
    CommandEntry::new("commandstats", common::COMMAND_STATS, Access::Get),
];

/// Keyword routing table for one device type
#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    entries: &'static [CommandEntry],
}

impl CommandTable {
    /// Wrap a device-specific table
    #[must_use]
    pub const fn new(entries: &'static [CommandEntry]) -> Self {
        Self { entries }
    }

    /// Device-specific rows, in declaration order
    #[must_use]
    pub const fn entries(&self) -> &'static [CommandEntry] {
        self.entries
    }

    /// Look up a keyword, device table first, then the common table
    #[must_use]
    pub fn find(&self, keyword: &str) -> Option<&'static CommandEntry> {
        self.entries
            .iter()
            .chain(COMMON_COMMANDS.iter())
            .find(|e| !e.is_hidden() && e.keyword.eq_ignore_ascii_case(keyword))
    }

    /// Keyword and verbs for a command id
    #[must_use]
    pub fn keyword_by_id(&self, id: u16) -> Option<(&'static str, Access)> {
        let table: &'static [CommandEntry] = if id >= common::FIRST {
            &COMMON_COMMANDS
        } else {
            self.entries
        };
        table
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.keyword, e.access))
    }

    /// Keywords reported by `supportedactions`
    #[must_use]
    pub fn supported_actions(&self) -> Vec<&'static str> {
        COMMON_COMMANDS
            .iter()
            .chain(self.entries.iter())
            .filter(|e| !e.is_hidden())
            .map(|e| e.keyword)
            .collect()
    }
}
