//! Reliever usage grading

use serde::{Deserialize, Serialize};

/// Daily reliever inhalations above this count are graded high
pub const HIGH_RELIEVER_USAGE_THRESHOLD: u32 = 12;

/// Reliever usage level for a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelieverUsage {
    Normal,
    High,
}

impl RelieverUsage {
    /// Grade a day's reliever inhalation count
    pub fn from_count(count: u32) -> Self {
        if count > HIGH_RELIEVER_USAGE_THRESHOLD {
            RelieverUsage::High
        } else {
            RelieverUsage::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelieverUsage::Normal => "normal",
            RelieverUsage::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_count() {
        assert_eq!(RelieverUsage::from_count(0), RelieverUsage::Normal);
        assert_eq!(RelieverUsage::from_count(12), RelieverUsage::Normal);
        assert_eq!(RelieverUsage::from_count(13), RelieverUsage::High);
        assert_eq!(RelieverUsage::from_count(u32::MAX), RelieverUsage::High);
    }
}
