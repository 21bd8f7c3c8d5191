//! Error types for the Alpaca server

use thiserror::Error;

use crate::protocol::AlpacaStatus;

/// Result type alias for Alpaca server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Alpaca server
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Inbound request could not be parsed
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A command finished with a non-success protocol status
    #[error("{status}: {message}")]
    Alpaca {
        /// Status reported in `ErrorNumber`
        status: AlpacaStatus,
        /// Text reported in `ErrorMessage`
        message: String,
    },

    /// Discovery failure for the current run
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A discovery run is already in progress for this device
    #[error("discovery already running for {0}")]
    DiscoveryActive(String),

    /// Hardware adapter failure
    #[error("hardware error: {0}")]
    Hardware(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a protocol-level failure with the given status
    pub fn alpaca(status: AlpacaStatus, message: impl Into<String>) -> Self {
        Self::Alpaca {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for an `InvalidValue` failure
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::alpaca(AlpacaStatus::InvalidValue, message)
    }

    /// Shorthand for an `InvalidOperation` failure
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::alpaca(AlpacaStatus::InvalidOperation, message)
    }

    /// Shorthand for a `NotImplemented` failure
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::alpaca(AlpacaStatus::NotImplemented, message)
    }

    /// Status and message this error reports on the wire
    ///
    /// Anything that is not already a protocol status becomes `InternalError`
    #[must_use]
    pub fn to_status(&self) -> (AlpacaStatus, String) {
        match self {
            Self::Alpaca { status, message } => (*status, message.clone()),
            Self::Hardware(msg) => (AlpacaStatus::UnspecifiedError, msg.clone()),
            other => (AlpacaStatus::InternalError, other.to_string()),
        }
    }
}
