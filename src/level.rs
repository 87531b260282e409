//! Severity tags for the five console entry points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    Info,
    Log,
    Warn,
    Error,
}

impl ConsoleLevel {
    /// Every level in slot order.
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Debug,
        ConsoleLevel::Info,
        ConsoleLevel::Log,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ];

    /// Wire name carried in the `level` field of a record.
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Log => "log",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Whether the default console writes this level to stderr.
    pub fn is_diagnostic(self) -> bool {
        matches!(self, ConsoleLevel::Warn | ConsoleLevel::Error)
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsoleLevel::Debug => "DEBUG",
            ConsoleLevel::Info => "INFO",
            ConsoleLevel::Log => "LOG",
            ConsoleLevel::Warn => "WARN",
            ConsoleLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Error returned when a level name is not one of the five severities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown console level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for ConsoleLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "log" => Ok(Self::Log),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(UnknownLevel(s.to_owned())),
        }
    }
}
