#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::cast_precision_loss)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::cast_sign_loss)]
#![deny(clippy::disallowed_types)]

//! The engine's boundary to the external value ledger.
//!
//! The ledger (campaign factory + campaign contracts + ERC-20 reward token)
//! is the system of record for budgets and transfers. This crate exposes it
//! as a transport-agnostic [`Ledger`] trait with two implementations:
//! [`eth_client::EthLedger`] over an EVM JSON-RPC endpoint under the
//! service's signing key, and [`mock_client::MockLedger`] for tests.
//!
//! Revert reasons come back as a tagged [`RevertReason`] rather than raw
//! message text, so callers never string-match contract errors themselves.

pub mod eth_client;
pub mod mock_client;

use async_trait::async_trait;
use reward_core::EthAddress;
use thiserror::Error;

pub use eth_client::{EthLedger, EthLedgerConfig};
pub use mock_client::{CallCounts, MockCampaign, MockLedger};

/// Known contract revert reasons, plus a fallback for anything unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    InsufficientBudget,
    AlreadyParticipated,
    MaxParticipantsReached,
    CampaignNotActive,
    Unknown,
}

impl RevertReason {
    /// Classify a raw error message by the custom-error names the campaign
    /// contract is known to revert with.
    pub fn from_message(message: &str) -> Self {
        if message.contains("InsufficientBudget") {
            RevertReason::InsufficientBudget
        } else if message.contains("AlreadyParticipated") {
            RevertReason::AlreadyParticipated
        } else if message.contains("MaxParticipantsReached") {
            RevertReason::MaxParticipantsReached
        } else if message.contains("CampaignNotActive") {
            RevertReason::CampaignNotActive
        } else {
            RevertReason::Unknown
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("contract reverted ({reason:?}): {message}")]
    Reverted {
        reason: RevertReason,
        message: String,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// The raw `getCampaignInfo()` view of a campaign contract.
///
/// Token amounts are decimal strings in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignInfo {
    pub brand: EthAddress,
    pub total_budget: String,
    pub remaining_budget: String,
    pub total_paid_out: String,
    pub participant_count: u64,
    pub max_participants: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub is_active: bool,
}

/// Required ledger capabilities, one method per published contract method.
///
/// Reads never mutate anything; `pay_reward` and `transfer` broadcast a
/// signed transaction and await one confirmation.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The address of the signing identity used for outbound writes.
    fn signer(&self) -> &EthAddress;

    async fn all_campaigns(&self) -> Result<Vec<EthAddress>, LedgerError>;
    async fn brand_campaigns(&self, brand: &EthAddress) -> Result<Vec<EthAddress>, LedgerError>;
    async fn campaign_info(&self, campaign: &EthAddress) -> Result<CampaignInfo, LedgerError>;
    async fn rules_hash(&self, campaign: &EthAddress) -> Result<String, LedgerError>;
    async fn max_payout_per_review(&self, campaign: &EthAddress) -> Result<String, LedgerError>;
    async fn reward_token(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError>;
    async fn campaign_brand(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError>;

    /// Pay a campaign-budgeted reward; returns the transaction hash.
    async fn pay_reward(
        &self,
        campaign: &EthAddress,
        user: &EthAddress,
        score: u8,
    ) -> Result<String, LedgerError>;

    /// Flat ERC-20 transfer from the signer; returns the transaction hash.
    async fn transfer(
        &self,
        token: &EthAddress,
        to: &EthAddress,
        amount: u128,
    ) -> Result<String, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reason_matches_known_errors() {
        assert_eq!(
            RevertReason::from_message("execution reverted: InsufficientBudget()"),
            RevertReason::InsufficientBudget
        );
        assert_eq!(
            RevertReason::from_message("reverted with custom error AlreadyParticipated"),
            RevertReason::AlreadyParticipated
        );
        assert_eq!(
            RevertReason::from_message("MaxParticipantsReached"),
            RevertReason::MaxParticipantsReached
        );
        assert_eq!(
            RevertReason::from_message("err: CampaignNotActive at block 123"),
            RevertReason::CampaignNotActive
        );
    }

    #[test]
    fn revert_reason_falls_back_to_unknown() {
        assert_eq!(
            RevertReason::from_message("connection refused"),
            RevertReason::Unknown
        );
        assert_eq!(RevertReason::from_message(""), RevertReason::Unknown);
    }
}
