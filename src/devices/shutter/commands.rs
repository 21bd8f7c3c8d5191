//! Shutter command table

use crate::protocol::{Access, CommandEntry, CommandTable};

pub const ALTITUDE: u16 = 0;
pub const CAN_SET_ALTITUDE: u16 = 1;
pub const CAN_SET_SHUTTER: u16 = 2;
pub const SHUTTER_STATUS: u16 = 3;
pub const ABORT_SLEW: u16 = 4;
pub const CLOSE_SHUTTER: u16 = 5;
pub const OPEN_SHUTTER: u16 = 6;
pub const SLEW_TO_ALTITUDE: u16 = 7;
pub const EXTRAS: u16 = 8;
pub const STOP: u16 = 9;
pub const READ_ALL: u16 = 10;

static ENTRIES: [CommandEntry; 11] = [
    CommandEntry::new("altitude", ALTITUDE, Access::Get),
    CommandEntry::new("cansetaltitude", CAN_SET_ALTITUDE, Access::Get),
    CommandEntry::new("cansetshutter", CAN_SET_SHUTTER, Access::Get),
    CommandEntry::new("shutterstatus", SHUTTER_STATUS, Access::Get),
    CommandEntry::new("abortslew", ABORT_SLEW, Access::Put),
    CommandEntry::new("closeshutter", CLOSE_SHUTTER, Access::Put),
    CommandEntry::new("openshutter", OPEN_SHUTTER, Access::Put),
    CommandEntry::new("slewtoaltitude", SLEW_TO_ALTITUDE, Access::Put),
    CommandEntry::new("--extras", EXTRAS, Access::Get),
    CommandEntry::new("stop", STOP, Access::Put),
    CommandEntry::new("readall", READ_ALL, Access::Get),
];

pub static TABLE: CommandTable = CommandTable::new(&ENTRIES);
