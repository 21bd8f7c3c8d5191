//! Camera command table

use crate::protocol::{Access, CommandEntry, CommandTable};

pub const BAYER_OFFSET_X: u16 = 0;
pub const BAYER_OFFSET_Y: u16 = 1;
pub const BIN_X: u16 = 2;
pub const BIN_Y: u16 = 3;
pub const CAMERA_STATE: u16 = 4;
pub const CAMERA_X_SIZE: u16 = 5;
pub const CAMERA_Y_SIZE: u16 = 6;
pub const CAN_ABORT_EXPOSURE: u16 = 7;
pub const CAN_ASYMMETRIC_BIN: u16 = 8;
pub const CAN_FAST_READOUT: u16 = 9;
pub const CAN_GET_COOLER_POWER: u16 = 10;
pub const CAN_PULSE_GUIDE: u16 = 11;
pub const CAN_SET_CCD_TEMPERATURE: u16 = 12;
pub const CAN_STOP_EXPOSURE: u16 = 13;
pub const CCD_TEMPERATURE: u16 = 14;
pub const COOLER_ON: u16 = 15;
pub const COOLER_POWER: u16 = 16;
pub const ELECTRONS_PER_ADU: u16 = 17;
pub const EXPOSURE_MAX: u16 = 18;
pub const EXPOSURE_MIN: u16 = 19;
pub const EXPOSURE_RESOLUTION: u16 = 20;
pub const FULL_WELL_CAPACITY: u16 = 21;
pub const GAIN: u16 = 22;
pub const GAIN_MAX: u16 = 23;
pub const GAIN_MIN: u16 = 24;
pub const HAS_SHUTTER: u16 = 25;
pub const IMAGE_ARRAY: u16 = 26;
pub const IMAGE_READY: u16 = 27;
pub const IS_PULSE_GUIDING: u16 = 28;
pub const LAST_EXPOSURE_DURATION: u16 = 29;
pub const LAST_EXPOSURE_START_TIME: u16 = 30;
pub const MAX_ADU: u16 = 31;
pub const MAX_BIN_X: u16 = 32;
pub const MAX_BIN_Y: u16 = 33;
pub const NUM_X: u16 = 34;
pub const NUM_Y: u16 = 35;
pub const OFFSET: u16 = 36;
pub const OFFSET_MAX: u16 = 37;
pub const OFFSET_MIN: u16 = 38;
pub const PERCENT_COMPLETED: u16 = 39;
pub const PIXEL_SIZE_X: u16 = 40;
pub const PIXEL_SIZE_Y: u16 = 41;
pub const READOUT_MODE: u16 = 42;
pub const READOUT_MODES: u16 = 43;
pub const SENSOR_NAME: u16 = 44;
pub const SENSOR_TYPE: u16 = 45;
pub const SET_CCD_TEMPERATURE: u16 = 46;
pub const START_X: u16 = 47;
pub const START_Y: u16 = 48;
pub const ABORT_EXPOSURE: u16 = 49;
pub const PULSE_GUIDE: u16 = 50;
pub const START_EXPOSURE: u16 = 51;
pub const STOP_EXPOSURE: u16 = 52;
pub const EXTRAS: u16 = 53;
pub const EXPOSURE_PHASE: u16 = 54;
pub const READ_ALL: u16 = 55;

static ENTRIES: [CommandEntry; 56] = [
    CommandEntry::new("bayeroffsetx", BAYER_OFFSET_X, Access::Get),
    CommandEntry::new("bayeroffsety", BAYER_OFFSET_Y, Access::Get),
    CommandEntry::new("binx", BIN_X, Access::Both),
    CommandEntry::new("biny", BIN_Y, Access::Both),
    CommandEntry::new("camerastate", CAMERA_STATE, Access::Get),
    CommandEntry::new("cameraxsize", CAMERA_X_SIZE, Access::Get),
    CommandEntry::new("cameraysize", CAMERA_Y_SIZE, Access::Get),
    CommandEntry::new("canabortexposure", CAN_ABORT_EXPOSURE, Access::Get),
    CommandEntry::new("canasymmetricbin", CAN_ASYMMETRIC_BIN, Access::Get),
    CommandEntry::new("canfastreadout", CAN_FAST_READOUT, Access::Get),
    CommandEntry::new("cangetcoolerpower", CAN_GET_COOLER_POWER, Access::Get),
    CommandEntry::new("canpulseguide", CAN_PULSE_GUIDE, Access::Get),
    CommandEntry::new("cansetccdtemperature", CAN_SET_CCD_TEMPERATURE, Access::Get),
    CommandEntry::new("canstopexposure", CAN_STOP_EXPOSURE, Access::Get),
    CommandEntry::new("ccdtemperature", CCD_TEMPERATURE, Access::Get),
    CommandEntry::new("cooleron", COOLER_ON, Access::Both),
    CommandEntry::new("coolerpower", COOLER_POWER, Access::Get),
    CommandEntry::new("electronsperadu", ELECTRONS_PER_ADU, Access::Get),
    CommandEntry::new("exposuremax", EXPOSURE_MAX, Access::Get),
    CommandEntry::new("exposuremin", EXPOSURE_MIN, Access::Get),
    CommandEntry::new("exposureresolution", EXPOSURE_RESOLUTION, Access::Get),
    CommandEntry::new("fullwellcapacity", FULL_WELL_CAPACITY, Access::Get),
    CommandEntry::new("gain", GAIN, Access::Both),
    CommandEntry::new("gainmax", GAIN_MAX, Access::Get),
    CommandEntry::new("gainmin", GAIN_MIN, Access::Get),
    CommandEntry::new("hasshutter", HAS_SHUTTER, Access::Get),
    CommandEntry::new("imagearray", IMAGE_ARRAY, Access::Get),
    CommandEntry::new("imageready", IMAGE_READY, Access::Get),
    CommandEntry::new("ispulseguiding", IS_PULSE_GUIDING, Access::Get),
    CommandEntry::new("lastexposureduration", LAST_EXPOSURE_DURATION, Access::Get),
    CommandEntry::new("lastexposurestarttime", LAST_EXPOSURE_START_TIME, Access::Get),
    CommandEntry::new("maxadu", MAX_ADU, Access::Get),
    CommandEntry::new("maxbinx", MAX_BIN_X, Access::Get),
    CommandEntry::new("maxbiny", MAX_BIN_Y, Access::Get),
    CommandEntry::new("numx", NUM_X, Access::Both),
    CommandEntry::new("numy", NUM_Y, Access::Both),
    CommandEntry::new("offset", OFFSET, Access::Both),
    CommandEntry::new("offsetmax", OFFSET_MAX, Access::Get),
    CommandEntry::new("offsetmin", OFFSET_MIN, Access::Get),
    CommandEntry::new("percentcompleted", PERCENT_COMPLETED, Access::Get),
    CommandEntry::new("pixelsizex", PIXEL_SIZE_X, Access::Get),
    CommandEntry::new("pixelsizey", PIXEL_SIZE_Y, Access::Get),
    CommandEntry::new("readoutmode", READOUT_MODE, Access::Both),
    CommandEntry::new("readoutmodes", READOUT_MODES, Access::Get),
    CommandEntry::new("sensorname", SENSOR_NAME, Access::Get),
    CommandEntry::new("sensortype", SENSOR_TYPE, Access::Get),
    CommandEntry::new("setccdtemperature", SET_CCD_TEMPERATURE, Access::Both),
    CommandEntry::new("startx", START_X, Access::Both),
    CommandEntry::new("starty", START_Y, Access::Both),
    CommandEntry::new("abortexposure", ABORT_EXPOSURE, Access::Put),
    CommandEntry::new("pulseguide", PULSE_GUIDE, Access::Put),
    CommandEntry::new("startexposure", START_EXPOSURE, Access::Put),
    CommandEntry::new("stopexposure", STOP_EXPOSURE, Access::Put),
    CommandEntry::new("--extras", EXTRAS, Access::Get),
    CommandEntry::new("exposurephase", EXPOSURE_PHASE, Access::Get),
    CommandEntry::new("readall", READ_ALL, Access::Get),
];

pub static TABLE: CommandTable = CommandTable::new(&ENTRIES);
