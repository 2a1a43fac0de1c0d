#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::cast_precision_loss)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::cast_sign_loss)]
#![deny(clippy::disallowed_types)]

//! Core types and pure decision logic for the reward settlement engine.
//!
//! This crate defines the entities shared by the ledger boundary, the
//! settlement engine, and the HTTP surface: EVM addresses, review scores,
//! campaigns, and the eligibility gate. Everything here is synchronous and
//! I/O-free.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod eligibility;

pub use eligibility::{evaluate, Eligibility, RejectReason, Thresholds};

/// Upper bound for each score component and for the derived overall score.
pub const SCORE_MAX: u8 = 100;

/// Maximum accepted length for a score explanation.
pub const EXPLANATION_MAX_LEN: usize = 500;

/// An EVM account address, stored lowercase.
///
/// Parsing accepts `0x` followed by exactly 40 hex digits in any case and
/// normalizes to lowercase, so equality on `EthAddress` is case-insensitive
/// address equality by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EthAddress(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid address: {0}")]
pub struct AddressError(String);

impl EthAddress {
    /// Parse and normalize an address string.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let hex_part = value
            .strip_prefix("0x")
            .ok_or_else(|| AddressError(value.to_string()))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError(value.to_string()));
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    /// Build an address from raw bytes (infallible, always lowercase).
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quality/spam/sentiment estimate attached to a review.
///
/// Produced externally by the scoring heuristic; immutable once attached to
/// a credential. Each component is in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScore {
    pub quality: u8,
    pub spam: u8,
    pub sentiment: u8,
    pub explanation: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("score component {name} out of range: {value}")]
    OutOfRange { name: &'static str, value: u32 },
    #[error("explanation exceeds {EXPLANATION_MAX_LEN} chars")]
    ExplanationTooLong,
}

impl ReviewScore {
    /// Validating constructor; rejects components above 100 and oversized
    /// explanations.
    pub fn new(
        quality: u32,
        spam: u32,
        sentiment: u32,
        explanation: impl Into<String>,
    ) -> Result<Self, ScoreError> {
        let explanation = explanation.into();
        if explanation.chars().count() > EXPLANATION_MAX_LEN {
            return Err(ScoreError::ExplanationTooLong);
        }
        Ok(Self {
            quality: component("quality", quality)?,
            spam: component("spam", spam)?,
            sentiment: component("sentiment", sentiment)?,
            explanation,
        })
    }

    /// Single payout-sizing score: `round((quality + (100 - spam) + sentiment) / 3)`.
    ///
    /// Integer arithmetic only; `(sum + 1) / 3` rounds thirds the same way
    /// round-half-up does. Always in `[0, 100]`.
    pub fn overall(&self) -> u8 {
        let sum =
            u32::from(self.quality) + (100 - u32::from(self.spam)) + u32::from(self.sentiment);
        u8::try_from((sum + 1) / 3).unwrap_or(SCORE_MAX)
    }
}

fn component(name: &'static str, value: u32) -> Result<u8, ScoreError> {
    if value > u32::from(SCORE_MAX) {
        return Err(ScoreError::OutOfRange { name, value });
    }
    u8::try_from(value).map_err(|_| ScoreError::OutOfRange { name, value })
}

/// A budgeted, time-bounded reward pool as read from the ledger.
///
/// This is a read-through view: it is assembled from on-chain reads and can
/// be stale the instant after it returns. Big token amounts are carried as
/// decimal strings in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub address: EthAddress,
    pub brand: EthAddress,
    pub total_budget: String,
    pub remaining_budget: String,
    pub total_paid_out: String,
    pub participant_count: u64,
    pub max_participants: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub is_active: bool,
    pub max_payout_per_review: String,
    pub rules_hash: String,
    pub pyusd_token: EthAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_normalizes_case() {
        let a = EthAddress::parse("0xAbCdEf1234567890aBcDeF1234567890ABCDEF12").unwrap();
        let b = EthAddress::parse("0xabcdef1234567890abcdef1234567890abcdef12").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef1234567890abcdef1234567890abcdef12");
    }

    #[test]
    fn address_parse_rejects_bad_shapes() {
        assert!(EthAddress::parse("abcdef1234567890abcdef1234567890abcdef12").is_err());
        assert!(EthAddress::parse("0x1234").is_err());
        assert!(EthAddress::parse("0xZZcdef1234567890abcdef1234567890abcdef12").is_err());
        assert!(EthAddress::parse("0xabcdef1234567890abcdef1234567890abcdef123").is_err());
    }

    #[test]
    fn address_from_bytes_round_trips() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xab;
        bytes[19] = 0x01;
        let addr = EthAddress::from_bytes(&bytes);
        assert_eq!(EthAddress::parse(addr.as_str()).unwrap(), addr);
    }

    #[test]
    fn score_constructor_validates_bounds() {
        assert!(ReviewScore::new(100, 0, 100, "ok").is_ok());
        assert_eq!(
            ReviewScore::new(101, 0, 0, ""),
            Err(ScoreError::OutOfRange {
                name: "quality",
                value: 101
            })
        );
        assert_eq!(
            ReviewScore::new(0, 200, 0, ""),
            Err(ScoreError::OutOfRange {
                name: "spam",
                value: 200
            })
        );
        let long = "x".repeat(EXPLANATION_MAX_LEN + 1);
        assert_eq!(
            ReviewScore::new(0, 0, 0, long),
            Err(ScoreError::ExplanationTooLong)
        );
    }

    #[test]
    fn overall_matches_reference_example() {
        // (85 + 90 + 70) / 3 = 81.67 -> 82
        let score = ReviewScore::new(85, 10, 70, "good").unwrap();
        assert_eq!(score.overall(), 82);
    }

    #[test]
    fn overall_is_bounded() {
        let min = ReviewScore::new(0, 100, 0, "").unwrap();
        assert_eq!(min.overall(), 0);
        let max = ReviewScore::new(100, 0, 100, "").unwrap();
        assert_eq!(max.overall(), 100);
        for quality in [0u32, 33, 50, 67, 100] {
            for spam in [0u32, 30, 70, 100] {
                for sentiment in [0u32, 49, 100] {
                    let s = ReviewScore::new(quality, spam, sentiment, "").unwrap();
                    assert!(s.overall() <= SCORE_MAX);
                }
            }
        }
    }

    #[test]
    fn overall_rounds_thirds() {
        // sum = 1 -> 0.33 -> 0
        assert_eq!(ReviewScore::new(1, 100, 0, "").unwrap().overall(), 0);
        // sum = 2 -> 0.67 -> 1
        assert_eq!(ReviewScore::new(2, 100, 0, "").unwrap().overall(), 1);
    }

    #[test]
    fn campaign_serializes_camel_case() {
        let campaign = Campaign {
            address: EthAddress::parse("0x1111111111111111111111111111111111111111").unwrap(),
            brand: EthAddress::parse("0x2222222222222222222222222222222222222222").unwrap(),
            total_budget: "1000000".to_string(),
            remaining_budget: "400000".to_string(),
            total_paid_out: "600000".to_string(),
            participant_count: 3,
            max_participants: 10,
            start_time: 1_700_000_000,
            end_time: 1_700_600_000,
            is_active: true,
            max_payout_per_review: "50000".to_string(),
            rules_hash: format!("0x{}", "00".repeat(32)),
            pyusd_token: EthAddress::parse("0x3333333333333333333333333333333333333333").unwrap(),
        };
        let json = serde_json::to_value(&campaign).unwrap();
        assert_eq!(json["totalBudget"], "1000000");
        assert_eq!(json["maxPayoutPerReview"], "50000");
        assert_eq!(json["isActive"], true);
        assert_eq!(
            json["pyusdToken"],
            "0x3333333333333333333333333333333333333333"
        );
    }
}
