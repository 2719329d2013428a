//! Inhalation effort classification
//!
//! Rates a single inhale event from its validity flag, status flags and peak
//! inspiratory flow (PIF, device units of 100 ml/min).

use crate::status::{has_system_errors, InhaleStatusFlag, StatusFlags};
use serde::{Deserialize, Serialize};

/// PIF below this value on a valid inhale means no inhalation
pub const NO_INHALATION_THRESHOLD: u32 = 300;

/// Upper bound (inclusive) of a low inhalation
pub const LOW_INHALATION_THRESHOLD: u32 = 450;

/// Upper bound (inclusive) of a good inhalation; above is a high-flow error
pub const HIGH_INHALATION_THRESHOLD: u32 = 2000;

/// Quality of an inhalation, or an indication of a device fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InhalationEffort {
    /// Valid inhale with PIF above the low threshold, up to the high threshold
    GoodInhalation,
    /// Valid inhale with PIF from the no-inhalation threshold up to the low threshold
    LowInhalation,
    /// Valid inhale below the no-inhalation threshold, or an invalid inhale
    /// that is neither an exhalation nor a system error
    NoInhalation,
    /// Invalid inhale flagged as an unexpected exhalation
    Exhalation,
    /// Valid inhale with PIF above the high threshold
    Error,
    /// Invalid inhale flagged as bad data, timestamp or parameter error
    SystemError,
}

impl InhalationEffort {
    /// Classify one inhale event.
    ///
    /// Missing readings are taken literally: a zero PIF on a valid inhale is
    /// `NoInhalation`.
    pub fn classify(
        is_valid_inhale: bool,
        issues: &StatusFlags,
        peak_inspiratory_flow: u32,
    ) -> Self {
        if !is_valid_inhale {
            if issues.contains(&InhaleStatusFlag::UnexpectedExhalation) {
                InhalationEffort::Exhalation
            } else if has_system_errors(issues) {
                InhalationEffort::SystemError
            } else {
                InhalationEffort::NoInhalation
            }
        } else if peak_inspiratory_flow < NO_INHALATION_THRESHOLD {
            InhalationEffort::NoInhalation
        } else if peak_inspiratory_flow <= LOW_INHALATION_THRESHOLD {
            InhalationEffort::LowInhalation
        } else if peak_inspiratory_flow <= HIGH_INHALATION_THRESHOLD {
            InhalationEffort::GoodInhalation
        } else {
            InhalationEffort::Error
        }
    }

    /// Good or low inhalation
    pub fn is_acceptable(&self) -> bool {
        matches!(
            self,
            InhalationEffort::GoodInhalation | InhalationEffort::LowInhalation
        )
    }

    /// No inhalation, exhalation or high-flow error
    pub fn is_unsuccessful(&self) -> bool {
        matches!(
            self,
            InhalationEffort::NoInhalation | InhalationEffort::Exhalation | InhalationEffort::Error
        )
    }

    /// Stable numeric code used across the FFI boundary
    pub fn ordinal(&self) -> i32 {
        match self {
            InhalationEffort::GoodInhalation => 0,
            InhalationEffort::LowInhalation => 1,
            InhalationEffort::NoInhalation => 2,
            InhalationEffort::Exhalation => 3,
            InhalationEffort::Error => 4,
            InhalationEffort::SystemError => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InhalationEffort::GoodInhalation => "good_inhalation",
            InhalationEffort::LowInhalation => "low_inhalation",
            InhalationEffort::NoInhalation => "no_inhalation",
            InhalationEffort::Exhalation => "exhalation",
            InhalationEffort::Error => "error",
            InhalationEffort::SystemError => "system_error",
        }
    }
}

/// PIF above the high threshold, regardless of validity
pub fn is_high_flow(peak_inspiratory_flow: u32) -> bool {
    peak_inspiratory_flow > HIGH_INHALATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::decode;

    fn valid(pif: u32) -> InhalationEffort {
        InhalationEffort::classify(true, &StatusFlags::new(), pif)
    }

    fn invalid(status: u32) -> InhalationEffort {
        InhalationEffort::classify(false, &decode(status), 0)
    }

    #[test]
    fn test_valid_inhale_boundaries() {
        assert_eq!(valid(0), InhalationEffort::NoInhalation);
        assert_eq!(valid(150), InhalationEffort::NoInhalation);
        assert_eq!(valid(299), InhalationEffort::NoInhalation);
        assert_eq!(valid(300), InhalationEffort::LowInhalation);
        assert_eq!(valid(400), InhalationEffort::LowInhalation);
        assert_eq!(valid(450), InhalationEffort::LowInhalation);
        assert_eq!(valid(451), InhalationEffort::GoodInhalation);
        assert_eq!(valid(2000), InhalationEffort::GoodInhalation);
        assert_eq!(valid(2001), InhalationEffort::Error);
        assert_eq!(valid(4000), InhalationEffort::Error);
    }

    #[test]
    fn test_valid_inhale_ignores_status() {
        let effort = InhalationEffort::classify(true, &decode(2 | 8), 600);
        assert_eq!(effort, InhalationEffort::GoodInhalation);
    }

    #[test]
    fn test_invalid_inhale_statuses() {
        assert_eq!(invalid(0), InhalationEffort::NoInhalation);
        assert_eq!(invalid(8), InhalationEffort::Exhalation);
        assert_eq!(invalid(4), InhalationEffort::NoInhalation);
        assert_eq!(invalid(2), InhalationEffort::SystemError);
        assert_eq!(invalid(16), InhalationEffort::SystemError);
        assert_eq!(invalid(64), InhalationEffort::SystemError);
        assert_eq!(invalid(1 | 32), InhalationEffort::NoInhalation);
    }

    #[test]
    fn test_exhalation_wins_over_system_error() {
        assert_eq!(invalid(8 | 2), InhalationEffort::Exhalation);
    }

    #[test]
    fn test_invalid_inhale_ignores_flow() {
        let effort = InhalationEffort::classify(false, &StatusFlags::new(), 900);
        assert_eq!(effort, InhalationEffort::NoInhalation);
    }

    #[test]
    fn test_derived_predicates() {
        assert!(InhalationEffort::GoodInhalation.is_acceptable());
        assert!(InhalationEffort::LowInhalation.is_acceptable());
        assert!(!InhalationEffort::SystemError.is_acceptable());

        assert!(InhalationEffort::NoInhalation.is_unsuccessful());
        assert!(InhalationEffort::Exhalation.is_unsuccessful());
        assert!(InhalationEffort::Error.is_unsuccessful());
        assert!(!InhalationEffort::SystemError.is_unsuccessful());
        assert!(!InhalationEffort::GoodInhalation.is_unsuccessful());
    }

    #[test]
    fn test_high_flow() {
        assert!(!is_high_flow(2000));
        assert!(is_high_flow(2001));
    }
}
