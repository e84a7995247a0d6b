//! Syslog-style severity levels.
//!
//! Lower numeric values are more severe. The numeric value is what the
//! GELF `level` field carries on the wire.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    #[default]
    Notice = 5,
    Info = 6,
    Debug = 7,
}

/// Returned when a string or number does not name a severity.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid severity: {0}")]
pub struct InvalidSeverity(pub String);

impl Severity {
    /// Numeric syslog value (0–7).
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether a record at `self` passes a `threshold` filter.
    pub fn is_enabled_for(self, threshold: Severity) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "Notice",
            Severity::Info => "Info",
            Severity::Debug => "Debug",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = InvalidSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EMERGENCY" => Ok(Self::Emergency),
            "ALERT" => Ok(Self::Alert),
            "CRITICAL" => Ok(Self::Critical),
            "ERROR" => Ok(Self::Error),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "NOTICE" => Ok(Self::Notice),
            "INFO" | "INFORMATIONAL" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            _ => Err(InvalidSeverity(s.to_owned())),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, InvalidSeverity> {
        Ok(match value {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            other => return Err(InvalidSeverity(other.to_string())),
        })
    }
}
