//! Alpaca status codes reported in `ErrorNumber`

use std::fmt;

/// Protocol-level outcome of a command
///
/// These are status codes, not Rust errors: every response carries one,
/// including successful ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlpacaStatus {
    Success,
    NotImplemented,
    PropertyNotImplemented,
    MethodNotImplemented,
    InvalidValue,
    ValueNotSet,
    NotConnected,
    InvalidWhileParked,
    InvalidWhileSlaved,
    InvalidOperation,
    ActionNotImplemented,
    NotSupported,
    FailedToTakePicture,
    DeviceBusy,
    DataFailure,
    UnspecifiedError,
    InternalError,
    FailedUnknown,
}

impl AlpacaStatus {
    /// Numeric value written to `ErrorNumber`
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NotImplemented | Self::PropertyNotImplemented | Self::MethodNotImplemented => {
                0x400
            }
            Self::InvalidValue => 0x401,
            Self::ValueNotSet => 0x402,
            Self::NotConnected => 0x407,
            Self::InvalidWhileParked => 0x408,
            Self::InvalidWhileSlaved => 0x409,
            Self::InvalidOperation => 0x40B,
            Self::ActionNotImplemented => 0x40C,
            Self::NotSupported => 0x500,
            Self::FailedToTakePicture => 0x501,
            Self::DeviceBusy => 0x503,
            Self::DataFailure => 0x504,
            Self::UnspecifiedError => 0x505,
            Self::InternalError => 0x507,
            Self::FailedUnknown => 0x508,
        }
    }

    /// Status for a numeric `ErrorNumber` reported by a peer
    ///
    /// Codes shared by several statuses map to the generic one; unknown
    /// codes become `FailedUnknown`
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Success,
            0x400 => Self::NotImplemented,
            0x401 => Self::InvalidValue,
            0x402 => Self::ValueNotSet,
            0x407 => Self::NotConnected,
            0x408 => Self::InvalidWhileParked,
            0x409 => Self::InvalidWhileSlaved,
            0x40B => Self::InvalidOperation,
            0x40C => Self::ActionNotImplemented,
            0x500 => Self::NotSupported,
            0x501 => Self::FailedToTakePicture,
            0x503 => Self::DeviceBusy,
            0x504 => Self::DataFailure,
            0x505 => Self::UnspecifiedError,
            0x507 => Self::InternalError,
            _ => Self::FailedUnknown,
        }
    }

    /// Whether this is the success status
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NotImplemented => "NotImplemented",
            Self::PropertyNotImplemented => "PropertyNotImplemented",
            Self::MethodNotImplemented => "MethodNotImplemented",
            Self::InvalidValue => "InvalidValue",
            Self::ValueNotSet => "ValueNotSet",
            Self::NotConnected => "NotConnected",
            Self::InvalidWhileParked => "InvalidWhileParked",
            Self::InvalidWhileSlaved => "InvalidWhileSlaved",
            Self::InvalidOperation => "InvalidOperation",
            Self::ActionNotImplemented => "ActionNotImplemented",
            Self::NotSupported => "NotSupported",
            Self::FailedToTakePicture => "FailedToTakePicture",
            Self::DeviceBusy => "DeviceBusy",
            Self::DataFailure => "DataFailure",
            Self::UnspecifiedError => "UnspecifiedError",
            Self::InternalError => "InternalError",
            Self::FailedUnknown => "FailedUnknown",
        }
    }
}

impl fmt::Display for AlpacaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:X})", self.as_str(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_protocol_table() {
        assert_eq!(AlpacaStatus::Success.code(), 0);
        assert_eq!(AlpacaStatus::InvalidValue.code(), 0x401);
        assert_eq!(AlpacaStatus::NotConnected.code(), 0x407);
        assert_eq!(AlpacaStatus::InvalidWhileParked.code(), 0x408);
        assert_eq!(AlpacaStatus::InvalidOperation.code(), 0x40B);
        assert_eq!(AlpacaStatus::ActionNotImplemented.code(), 0x40C);
        assert_eq!(AlpacaStatus::DeviceBusy.code(), 0x503);
        assert_eq!(AlpacaStatus::InternalError.code(), 0x507);
    }

    #[test]
    fn not_implemented_family_shares_a_code() {
        assert_eq!(
            AlpacaStatus::PropertyNotImplemented.code(),
            AlpacaStatus::MethodNotImplemented.code()
        );
        assert_eq!(AlpacaStatus::NotImplemented.code(), 0x400);
    }

    #[test]
    fn peer_codes_map_back() {
        assert_eq!(AlpacaStatus::from_code(0x503), AlpacaStatus::DeviceBusy);
        assert_eq!(AlpacaStatus::from_code(0x400), AlpacaStatus::NotImplemented);
        assert_eq!(AlpacaStatus::from_code(0x4FF), AlpacaStatus::FailedUnknown);
        assert!(AlpacaStatus::from_code(0).is_success());
    }

    #[test]
    fn display_includes_hex_code() {
        assert_eq!(AlpacaStatus::DeviceBusy.to_string(), "DeviceBusy (0x503)");
    }
}
