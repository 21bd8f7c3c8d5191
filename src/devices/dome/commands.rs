//! Dome command table

use crate::protocol::{Access, CommandEntry, CommandTable};

pub const ALTITUDE: u16 = 0;
pub const AT_HOME: u16 = 1;
pub const AT_PARK: u16 = 2;
pub const AZIMUTH: u16 = 3;
pub const CAN_FIND_HOME: u16 = 4;
pub const CAN_PARK: u16 = 5;
pub const CAN_SET_ALTITUDE: u16 = 6;
pub const CAN_SET_AZIMUTH: u16 = 7;
pub const CAN_SET_PARK: u16 = 8;
pub const CAN_SET_SHUTTER: u16 = 9;
pub const CAN_SLAVE: u16 = 10;
pub const CAN_SYNC_AZIMUTH: u16 = 11;
pub const SHUTTER_STATUS: u16 = 12;
pub const SLAVED: u16 = 13;
pub const SLEWING: u16 = 14;
pub const ABORT_SLEW: u16 = 15;
pub const CLOSE_SHUTTER: u16 = 16;
pub const FIND_HOME: u16 = 17;
pub const OPEN_SHUTTER: u16 = 18;
pub const PARK: u16 = 19;
pub const SET_PARK: u16 = 20;
pub const SLEW_TO_ALTITUDE: u16 = 21;
pub const SLEW_TO_AZIMUTH: u16 = 22;
pub const SYNC_TO_AZIMUTH: u16 = 23;
pub const EXTRAS: u16 = 24;
pub const POWER_ON: u16 = 25;
pub const POWER_OFF: u16 = 26;
pub const POWER_STATUS: u16 = 27;
pub const AUXILIARY_ON: u16 = 28;
pub const AUXILIARY_OFF: u16 = 29;
pub const AUXILIARY_STATUS: u16 = 30;
pub const GO_LEFT: u16 = 31;
pub const GO_RIGHT: u16 = 32;
pub const BUMP_LEFT: u16 = 33;
pub const BUMP_RIGHT: u16 = 34;
pub const SLOW_LEFT: u16 = 35;
pub const SLOW_RIGHT: u16 = 36;
pub const CURRENT_STATE: u16 = 37;
pub const READ_ALL: u16 = 38;

static ENTRIES: [CommandEntry; 39] = [
    CommandEntry::new("altitude", ALTITUDE, Access::Get),
    CommandEntry::new("athome", AT_HOME, Access::Get),
    CommandEntry::new("atpark", AT_PARK, Access::Get),
    CommandEntry::new("azimuth", AZIMUTH, Access::Get),
    CommandEntry::new("canfindhome", CAN_FIND_HOME, Access::Get),
    CommandEntry::new("canpark", CAN_PARK, Access::Get),
    CommandEntry::new("cansetaltitude", CAN_SET_ALTITUDE, Access::Get),
    CommandEntry::new("cansetazimuth", CAN_SET_AZIMUTH, Access::Get),
    CommandEntry::new("cansetpark", CAN_SET_PARK, Access::Get),
    CommandEntry::new("cansetshutter", CAN_SET_SHUTTER, Access::Get),
    CommandEntry::new("canslave", CAN_SLAVE, Access::Get),
    CommandEntry::new("cansyncazimuth", CAN_SYNC_AZIMUTH, Access::Get),
    CommandEntry::new("shutterstatus", SHUTTER_STATUS, Access::Get),
    CommandEntry::new("slaved", SLAVED, Access::Both),
    CommandEntry::new("slewing", SLEWING, Access::Get),
    CommandEntry::new("abortslew", ABORT_SLEW, Access::Put),
    CommandEntry::new("closeshutter", CLOSE_SHUTTER, Access::Put),
    CommandEntry::new("findhome", FIND_HOME, Access::Put),
    CommandEntry::new("openshutter", OPEN_SHUTTER, Access::Put),
    CommandEntry::new("park", PARK, Access::Put),
    CommandEntry::new("setpark", SET_PARK, Access::Put),
    CommandEntry::new("slewtoaltitude", SLEW_TO_ALTITUDE, Access::Put),
    CommandEntry::new("slewtoazimuth", SLEW_TO_AZIMUTH, Access::Put),
    CommandEntry::new("synctoazimuth", SYNC_TO_AZIMUTH, Access::Put),
    CommandEntry::new("--extras", EXTRAS, Access::Get),
    CommandEntry::new("poweron", POWER_ON, Access::Put),
    CommandEntry::new("poweroff", POWER_OFF, Access::Put),
    CommandEntry::new("powerstatus", POWER_STATUS, Access::Get),
    CommandEntry::new("auxiliaryon", AUXILIARY_ON, Access::Put),
    CommandEntry::new("auxiliaryoff", AUXILIARY_OFF, Access::Put),
    CommandEntry::new("auxiliarystatus", AUXILIARY_STATUS, Access::Get),
    CommandEntry::new("goleft", GO_LEFT, Access::Put),
    CommandEntry::new("goright", GO_RIGHT, Access::Put),
    CommandEntry::new("bumpleft", BUMP_LEFT, Access::Put),
    CommandEntry::new("bumpright", BUMP_RIGHT, Access::Put),
    CommandEntry::new("slowleft", SLOW_LEFT, Access::Put),
    CommandEntry::new("slowright", SLOW_RIGHT, Access::Put),
    CommandEntry::new("currentstate", CURRENT_STATE, Access::Get),
    CommandEntry::new("readall", READ_ALL, Access::Get),
];

pub static TABLE: CommandTable = CommandTable::new(&ENTRIES);
