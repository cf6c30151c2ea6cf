//! Risk categorization.
//!
//! Maps a confidence score to a coarse risk bucket. The mapping depends on
//! nothing but the score and the configured thresholds.

use serde::{Deserialize, Serialize};

use crate::types::RiskCategory;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Confidence at or above which a slip is low risk.
    pub low_threshold: f64,
    /// Confidence at or above which a slip is medium risk.
    pub medium_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.75,
            medium_threshold: 0.40,
        }
    }
}

impl RiskConfig {
    pub fn categorize(&self, confidence: f64) -> RiskCategory {
        if confidence >= self.low_threshold {
            RiskCategory::Low
        } else if confidence >= self.medium_threshold {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_inclusive() {
        let cfg = RiskConfig::default();
        assert_eq!(cfg.categorize(0.75), RiskCategory::Low);
        assert_eq!(cfg.categorize(0.7499), RiskCategory::Medium);
        assert_eq!(cfg.categorize(0.40), RiskCategory::Medium);
        assert_eq!(cfg.categorize(0.3999), RiskCategory::High);
        assert_eq!(cfg.categorize(0.0), RiskCategory::High);
        assert_eq!(cfg.categorize(1.0), RiskCategory::Low);
    }

    #[test]
    fn test_custom_thresholds() {
        let cfg = RiskConfig {
            low_threshold: 0.9,
            medium_threshold: 0.5,
        };
        assert_eq!(cfg.categorize(0.8), RiskCategory::Medium);
        assert_eq!(cfg.categorize(0.45), RiskCategory::High);
    }
}
