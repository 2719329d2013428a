//! Runtime analysis configuration
//!
//! Policy values that a host application may tune. Domain constants such as
//! the PIF thresholds and the reliever usage threshold are not configurable
//! and live next to the code that uses them.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

fn default_environment_max_age_minutes() -> u32 {
    1440
}

fn default_feedback_window_minutes() -> u32 {
    15
}

fn default_consecutive_acceptable_for_tip() -> usize {
    10
}

fn default_suboptimal_sample_size() -> usize {
    12
}

fn default_suboptimal_threshold() -> usize {
    6
}

/// Tunable analysis policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Environment advisories older than this are stale
    #[serde(default = "default_environment_max_age_minutes")]
    pub environment_max_age_minutes: u32,

    /// Feedback is only raised for events younger than this
    #[serde(default = "default_feedback_window_minutes")]
    pub feedback_window_minutes: u32,

    /// Consecutive acceptable inhalations before the turn-off tip is offered
    #[serde(default = "default_consecutive_acceptable_for_tip")]
    pub consecutive_acceptable_for_tip: usize,

    /// Number of recent non-system-error events examined for suboptimal use
    #[serde(default = "default_suboptimal_sample_size")]
    pub suboptimal_sample_size: usize,

    /// Unsuccessful events within the sample that trigger suboptimal feedback
    #[serde(default = "default_suboptimal_threshold")]
    pub suboptimal_threshold: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            environment_max_age_minutes: default_environment_max_age_minutes(),
            feedback_window_minutes: default_feedback_window_minutes(),
            consecutive_acceptable_for_tip: default_consecutive_acceptable_for_tip(),
            suboptimal_sample_size: default_suboptimal_sample_size(),
            suboptimal_threshold: default_suboptimal_threshold(),
        }
    }
}

impl AnalysisConfig {
    /// Check that the values are usable together
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.suboptimal_threshold == 0 {
            return Err(AnalysisError::InvalidConfig(
                "suboptimal_threshold must be greater than zero".to_string(),
            ));
        }
        if self.suboptimal_threshold > self.suboptimal_sample_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "suboptimal_threshold ({}) exceeds suboptimal_sample_size ({})",
                self.suboptimal_threshold, self.suboptimal_sample_size
            )));
        }
        if self.consecutive_acceptable_for_tip == 0 {
            return Err(AnalysisError::InvalidConfig(
                "consecutive_acceptable_for_tip must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate configuration from a JSON object
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(AnalysisError::InvalidConfig(
                "configuration must be a JSON object".to_string(),
            ));
        }
        let config: AnalysisConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self).map_err(|e| AnalysisError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.environment_max_age_minutes, 1440);
        assert_eq!(config.feedback_window_minutes, 15);
        assert_eq!(config.consecutive_acceptable_for_tip, 10);
        assert_eq!(config.suboptimal_sample_size, 12);
        assert_eq!(config.suboptimal_threshold, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnalysisConfig::from_json(r#"{"feedback_window_minutes": 30}"#).unwrap();
        assert_eq!(config.feedback_window_minutes, 30);
        assert_eq!(config.suboptimal_sample_size, 12);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = AnalysisConfig::default();
        config.environment_max_age_minutes = 60;
        let json = config.to_json().unwrap();
        assert_eq!(AnalysisConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = AnalysisConfig::from_json(r#"{"suboptimal_threshold": 20}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));

        let err =
            AnalysisConfig::from_json(r#"{"consecutive_acceptable_for_tip": 0}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));

        let err = AnalysisConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, AnalysisError::JsonError(_)));

        let err = AnalysisConfig::from_json("[]").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }
}
