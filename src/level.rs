// Log levels (DLT verbose-mode ordering: Off is most severe cutoff, Verbose the least)

use serde::{Deserialize, Serialize};

/// Log levels, totally ordered: `Off < Fatal < Error < Warn < Info < Debug < Verbose`.
///
/// A message with level `L` passes a threshold `T` iff `T >= L`, so `Off`
/// suppresses everything and `Verbose` lets everything through.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Logging disabled for this context
    #[default]
    Off = 0,
    /// Unrecoverable failures
    Fatal = 1,
    /// Errors the application can survive
    Error = 2,
    /// Unexpected but handled conditions
    Warn = 3,
    /// Regular operational messages
    Info = 4,
    /// Detailed diagnostics
    Debug = 5,
    /// Highest verbosity
    Verbose = 6,
}

impl LogLevel {
    /// Get level as u8 (0-6)
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get level name as it appears in the text output
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
        }
    }

    /// Create from u8 value (returns None if out of range)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogLevel::Off),
            1 => Some(LogLevel::Fatal),
            2 => Some(LogLevel::Error),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Info),
            5 => Some(LogLevel::Debug),
            6 => Some(LogLevel::Verbose),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(LogLevel::Off),
            "fatal" => Ok(LogLevel::Fatal),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "verbose" => Ok(LogLevel::Verbose),
            other => Err(crate::error::Error::InvalidLogLevelString(
                other.to_string(),
            )),
        }
    }
}
