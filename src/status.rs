//! Inhale status codec
//!
//! Devices report the outcome of each inhalation as a bitmask. This module
//! decodes that bitmask into a set of named flags, encodes flag sets back into
//! a bitmask, and maps the device-fault flags onto system error codes.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single status bit reported by the inhaler.
///
/// Declaration order follows bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InhaleStatusFlag {
    /// The event timed out before the cap was closed
    Timeout,
    /// The event record was corrupted
    BadData,
    /// Multiple inhalations detected
    MultipleInhalations,
    /// Exhalation detected instead of inhalation
    UnexpectedExhalation,
    /// The device detected a power reset and the timestamp is not valid
    TimestampError,
    /// No inhalation was detected
    NoInhalation,
    /// Inhale profile parameters may not be valid (still counts as an inhale)
    InhaleParameterError,
}

impl InhaleStatusFlag {
    /// Every known flag, in bit order
    pub const ALL: [InhaleStatusFlag; 7] = [
        InhaleStatusFlag::Timeout,
        InhaleStatusFlag::BadData,
        InhaleStatusFlag::MultipleInhalations,
        InhaleStatusFlag::UnexpectedExhalation,
        InhaleStatusFlag::TimestampError,
        InhaleStatusFlag::NoInhalation,
        InhaleStatusFlag::InhaleParameterError,
    ];

    /// Bit value of this flag within the status bitmask
    pub const fn value(self) -> u32 {
        match self {
            InhaleStatusFlag::Timeout => 1 << 0,
            InhaleStatusFlag::BadData => 1 << 1,
            InhaleStatusFlag::MultipleInhalations => 1 << 2,
            InhaleStatusFlag::UnexpectedExhalation => 1 << 3,
            InhaleStatusFlag::TimestampError => 1 << 4,
            InhaleStatusFlag::NoInhalation => 1 << 5,
            InhaleStatusFlag::InhaleParameterError => 1 << 6,
        }
    }

    /// System error code for device-fault flags, `None` for technique flags
    pub const fn system_error_code(self) -> Option<SystemErrorCode> {
        match self {
            InhaleStatusFlag::BadData => Some(SystemErrorCode::BadData),
            InhaleStatusFlag::TimestampError => Some(SystemErrorCode::TimestampError),
            InhaleStatusFlag::InhaleParameterError => Some(SystemErrorCode::InhalerParameterError),
            _ => None,
        }
    }

    pub const fn is_system_error(self) -> bool {
        self.system_error_code().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InhaleStatusFlag::Timeout => "timeout",
            InhaleStatusFlag::BadData => "bad_data",
            InhaleStatusFlag::MultipleInhalations => "multiple_inhalations",
            InhaleStatusFlag::UnexpectedExhalation => "unexpected_exhalation",
            InhaleStatusFlag::TimestampError => "timestamp_error",
            InhaleStatusFlag::NoInhalation => "no_inhalation",
            InhaleStatusFlag::InhaleParameterError => "inhale_parameter_error",
        }
    }
}

/// Decoded status flags, ordered by bit position
pub type StatusFlags = BTreeSet<InhaleStatusFlag>;

/// Device fault reported alongside an inhale event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemErrorCode {
    BadData = 1,
    TimestampError = 2,
    InhalerParameterError = 3,
}

impl SystemErrorCode {
    /// Numeric code shown to the user
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Convert a stored numeric code back into a `SystemErrorCode`
    pub fn from_code(code: u8) -> Result<Self, AnalysisError> {
        match code {
            1 => Ok(SystemErrorCode::BadData),
            2 => Ok(SystemErrorCode::TimestampError),
            3 => Ok(SystemErrorCode::InhalerParameterError),
            other => Err(AnalysisError::invalid_ordinal("system error code", other)),
        }
    }
}

impl fmt::Display for SystemErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Decode a raw status bitmask into its flags.
///
/// Unknown bits are ignored.
pub fn decode(status: u32) -> StatusFlags {
    InhaleStatusFlag::ALL
        .iter()
        .copied()
        .filter(|flag| status & flag.value() == flag.value())
        .collect()
}

/// Encode a flag set into a status bitmask (OR of the flags present).
pub fn encode(flags: &StatusFlags) -> u32 {
    flags.iter().fold(0, |value, flag| value | flag.value())
}

/// System error codes for the device-fault flags present, ordered by code
pub fn system_error_codes(flags: &StatusFlags) -> Vec<SystemErrorCode> {
    let mut codes: Vec<SystemErrorCode> = flags
        .iter()
        .filter_map(|flag| flag.system_error_code())
        .collect();
    codes.sort();
    codes
}

/// Whether any bad-data, timestamp or inhale-parameter flag is present
pub fn has_system_errors(flags: &StatusFlags) -> bool {
    flags.iter().any(|flag| flag.is_system_error())
}

/// Bitmask covering every system-error flag
pub fn system_error_mask() -> u32 {
    InhaleStatusFlag::ALL
        .iter()
        .filter(|flag| flag.is_system_error())
        .fold(0, |mask, flag| mask | flag.value())
}

/// Join error codes the way they are presented to the user ("1, 3")
pub fn format_error_codes(codes: &[SystemErrorCode]) -> String {
    codes
        .iter()
        .map(|code| code.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
