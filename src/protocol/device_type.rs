//! Device type names used in request paths and management listings

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of device addressed by `/api/v1/<type>/<number>/...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    Camera,
    CoverCalibrator,
    Dome,
    Filterwheel,
    Focuser,
    Management,
    ObservingConditions,
    Rotator,
    SafetyMonitor,
    Switch,
    Telescope,
    Multicam,
    Shutter,
    SlitTracker,
}

impl DeviceType {
    /// Every known device type
    pub const ALL: [Self; 14] = [
        Self::Camera,
        Self::CoverCalibrator,
        Self::Dome,
        Self::Filterwheel,
        Self::Focuser,
        Self::Management,
        Self::ObservingConditions,
        Self::Rotator,
        Self::SafetyMonitor,
        Self::Switch,
        Self::Telescope,
        Self::Multicam,
        Self::Shutter,
        Self::SlitTracker,
    ];

    /// Display name as reported in `configureddevices`
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::CoverCalibrator => "CoverCalibrator",
            Self::Dome => "Dome",
            Self::Filterwheel => "Filterwheel",
            Self::Focuser => "Focuser",
            Self::Management => "Management",
            Self::ObservingConditions => "Observingconditions",
            Self::Rotator => "Rotator",
            Self::SafetyMonitor => "SafetyMonitor",
            Self::Switch => "Switch",
            Self::Telescope => "Telescope",
            Self::Multicam => "Multicam",
            Self::Shutter => "Shutter",
            Self::SlitTracker => "SlitTracker",
        }
    }

    /// Small stable code, used as the model field of unique ids
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::BadRequest(format!("unknown device type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_segments_case_insensitively() {
        assert_eq!("dome".parse::<DeviceType>().unwrap(), DeviceType::Dome);
        assert_eq!(
            "observingconditions".parse::<DeviceType>().unwrap(),
            DeviceType::ObservingConditions
        );
        assert_eq!(
            "SafetyMonitor".parse::<DeviceType>().unwrap(),
            DeviceType::SafetyMonitor
        );
    }

    #[test]
    fn rejects_unknown_types() {
        assert!("toaster".parse::<DeviceType>().is_err());
    }

    #[test]
    fn codes_are_distinct() {
        let mut codes: Vec<u16> = DeviceType::ALL.iter().map(|t| t.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), DeviceType::ALL.len());
    }
}
