//! Telescope command table

use crate::protocol::{Access, CommandEntry, CommandTable};

pub const ALIGNMENT_MODE: u16 = 0;
pub const AT_HOME: u16 = 1;
pub const AT_PARK: u16 = 2;
pub const CAN_FIND_HOME: u16 = 3;
pub const CAN_PARK: u16 = 4;
pub const CAN_PULSE_GUIDE: u16 = 5;
pub const CAN_SET_TRACKING: u16 = 6;
pub const CAN_SLEW: u16 = 7;
pub const CAN_SLEW_ASYNC: u16 = 8;
pub const CAN_SYNC: u16 = 9;
pub const CAN_UNPARK: u16 = 10;
pub const DECLINATION: u16 = 11;
pub const RIGHT_ASCENSION: u16 = 12;
pub const SIDEREAL_TIME: u16 = 13;
pub const SITE_ELEVATION: u16 = 14;
pub const SITE_LATITUDE: u16 = 15;
pub const SITE_LONGITUDE: u16 = 16;
pub const SLEWING: u16 = 17;
pub const TARGET_DECLINATION: u16 = 18;
pub const TARGET_RIGHT_ASCENSION: u16 = 19;
pub const TRACKING: u16 = 20;
pub const TRACKING_RATE: u16 = 21;
pub const UTC_DATE: u16 = 22;
pub const ABORT_SLEW: u16 = 23;
pub const FIND_HOME: u16 = 24;
pub const PARK: u16 = 25;
pub const PULSE_GUIDE: u16 = 26;
pub const SLEW_TO_COORDINATES_ASYNC: u16 = 27;
pub const SLEW_TO_TARGET_ASYNC: u16 = 28;
pub const SYNC_TO_COORDINATES: u16 = 29;
pub const SYNC_TO_TARGET: u16 = 30;
pub const UNPARK: u16 = 31;
pub const EXTRAS: u16 = 32;
pub const HOUR_ANGLE: u16 = 33;
pub const CURRENT_STATE: u16 = 34;
pub const READ_ALL: u16 = 35;

static ENTRIES: [CommandEntry; 36] = [
    CommandEntry::new("alignmentmode", ALIGNMENT_MODE, Access::Get),
    CommandEntry::new("athome", AT_HOME, Access::Get),
    CommandEntry::new("atpark", AT_PARK, Access::Get),
    CommandEntry::new("canfindhome", CAN_FIND_HOME, Access::Get),
    CommandEntry::new("canpark", CAN_PARK, Access::Get),
    CommandEntry::new("canpulseguide", CAN_PULSE_GUIDE, Access::Get),
    CommandEntry::new("cansettracking", CAN_SET_TRACKING, Access::Get),
    CommandEntry::new("canslew", CAN_SLEW, Access::Get),
    CommandEntry::new("canslewasync", CAN_SLEW_ASYNC, Access::Get),
    CommandEntry::new("cansync", CAN_SYNC, Access::Get),
    CommandEntry::new("canunpark", CAN_UNPARK, Access::Get),
    CommandEntry::new("declination", DECLINATION, Access::Get),
    CommandEntry::new("rightascension", RIGHT_ASCENSION, Access::Get),
    CommandEntry::new("siderealtime", SIDEREAL_TIME, Access::Get),
    CommandEntry::new("siteelevation", SITE_ELEVATION, Access::Both),
    CommandEntry::new("sitelatitude", SITE_LATITUDE, Access::Both),
    CommandEntry::new("sitelongitude", SITE_LONGITUDE, Access::Both),
    CommandEntry::new("slewing", SLEWING, Access::Get),
    CommandEntry::new("targetdeclination", TARGET_DECLINATION, Access::Both),
    CommandEntry::new("targetrightascension", TARGET_RIGHT_ASCENSION, Access::Both),
    CommandEntry::new("tracking", TRACKING, Access::Both),
    CommandEntry::new("trackingrate", TRACKING_RATE, Access::Get),
    CommandEntry::new("utcdate", UTC_DATE, Access::Get),
    CommandEntry::new("abortslew", ABORT_SLEW, Access::Put),
    CommandEntry::new("findhome", FIND_HOME, Access::Put),
    CommandEntry::new("park", PARK, Access::Put),
    CommandEntry::new("pulseguide", PULSE_GUIDE, Access::Put),
    CommandEntry::new("slewtocoordinatesasync", SLEW_TO_COORDINATES_ASYNC, Access::Put),
    CommandEntry::new("slewtotargetasync", SLEW_TO_TARGET_ASYNC, Access::Put),
    CommandEntry::new("synctocoordinates", SYNC_TO_COORDINATES, Access::Put),
    CommandEntry::new("synctotarget", SYNC_TO_TARGET, Access::Put),
    CommandEntry::new("unpark", UNPARK, Access::Put),
    CommandEntry::new("--extras", EXTRAS, Access::Get),
    CommandEntry::new("hourangle", HOUR_ANGLE, Access::Get),
    CommandEntry::new("currentstate", CURRENT_STATE, Access::Get),
    CommandEntry::new("readall", READ_ALL, Access::Get),
];

pub static TABLE: CommandTable = CommandTable::new(&ENTRIES);
