//! Confidence classification: raw score -> discrete confidence bucket.
//!
//! The default thresholds (0.25 / 0.15 / 0.10) are empirically chosen
//! constants carried as configuration, not values to re-derive. Lower bounds
//! are inclusive, so a boundary score resolves to the higher bucket.

use crate::model::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// Score thresholds for the confidence buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Minimum score for `high`.
    pub high: f64,
    /// Minimum score for `medium`.
    pub medium: f64,
    /// Minimum score for `low`; anything below is discarded.
    pub low: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.25,
            medium: 0.15,
            low: 0.10,
        }
    }
}

impl ConfidenceThresholds {
    /// Map a raw score to a bucket; `None` means the candidate is discarded.
    pub fn classify(&self, score: f64) -> Option<ConfidenceLevel> {
        if score >= self.high {
            Some(ConfidenceLevel::High)
        } else if score >= self.medium {
            Some(ConfidenceLevel::Medium)
        } else if score >= self.low {
            Some(ConfidenceLevel::Low)
        } else {
            None
        }
    }

    /// Thresholds must be ordered and inside [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        let ordered = 0.0 <= self.low && self.low <= self.medium && self.medium <= self.high;
        if !ordered || self.high > 1.0 {
            return Err(format!(
                "confidence thresholds must satisfy 0 <= low <= medium <= high <= 1, got low={} medium={} high={}",
                self.low, self.medium, self.high
            ));
        }
        Ok(())
    }
}
