//! Quality/spam eligibility gate.
//!
//! Pure function of the score and the configured thresholds; the same gate
//! serves both the flat-reward and campaign-reward paths, each of which may
//! carry its own thresholds.

use crate::ReviewScore;
use serde::{Deserialize, Serialize};

/// Gate thresholds. Quality below `quality_min` or spam above `spam_max`
/// rejects the review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub quality_min: u8,
    pub spam_max: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            quality_min: 70,
            spam_max: 30,
        }
    }
}

/// Why a review was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LowQuality,
    HighSpam,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LowQuality => "low_quality",
            RejectReason::HighSpam => "high_spam",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the eligibility gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(RejectReason),
}

/// Evaluate a score against the thresholds.
///
/// Quality is checked before spam; when both conditions hold, `LowQuality`
/// is reported (first match wins, callers must not assume both were
/// evaluated).
pub fn evaluate(score: &ReviewScore, thresholds: &Thresholds) -> Eligibility {
    if score.quality < thresholds.quality_min {
        return Eligibility::Ineligible(RejectReason::LowQuality);
    }
    if score.spam > thresholds.spam_max {
        return Eligibility::Ineligible(RejectReason::HighSpam);
    }
    Eligibility::Eligible
}
