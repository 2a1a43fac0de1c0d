//! Payout orchestration.
//!
//! Coordinates the eligibility gate, the campaign registry, and the ledger
//! to execute either a flat reward transfer or a campaign-budgeted payout.
//! The gate runs before any ledger call, so rejected reviews cost nothing.
//!
//! Nothing here retries: every ledger failure is terminal for the request
//! and must be re-initiated by the caller. A transaction that is broadcast
//! but never confirms is reported failed even though funds may ultimately
//! move; there is no reconciliation job.

use reward_core::{evaluate, Eligibility, EthAddress, RejectReason, ReviewScore, Thresholds};
use reward_ledger::{Ledger, LedgerError, RevertReason};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::CampaignRegistry;

#[derive(Debug, Clone)]
pub struct PayoutConfig {
    pub thresholds: Thresholds,
    /// ERC-20 contract used for flat rewards.
    pub reward_token: EthAddress,
    /// Flat reward amount in the token's smallest unit; never derived from
    /// the score.
    pub reward_amount: u128,
}

/// Flat-reward settlement request.
#[derive(Debug, Clone)]
pub struct DirectRequest {
    pub address: EthAddress,
    pub review_hash: String,
    pub score: ReviewScore,
}

/// Campaign-budgeted settlement request.
#[derive(Debug, Clone)]
pub struct CampaignRequest {
    pub campaign: EthAddress,
    pub user: EthAddress,
    pub review: String,
    pub score: ReviewScore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectPayout {
    pub review_hash: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignPayout {
    pub tx_hash: String,
    pub campaign: EthAddress,
    pub user: EthAddress,
    pub score: u8,
    pub review_hash: String,
}

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("review rejected: {0}")]
    Ineligible(RejectReason),
    #[error("campaign {0} is not registered with the factory")]
    CampaignNotFound(EthAddress),
    #[error("signer {signer} is not the campaign brand {brand}")]
    UnauthorizedNotBrand {
        signer: EthAddress,
        brand: EthAddress,
    },
    #[error("insufficient campaign budget")]
    InsufficientBudget,
    #[error("user already claimed from this campaign")]
    AlreadyClaimed,
    #[error("campaign participant cap reached")]
    CampaignFull,
    #[error("campaign is not active")]
    CampaignNotActive,
    #[error("reward transfer failed: {0}")]
    RewardFailed(String),
    #[error("campaign payout failed: {0}")]
    PayRewardFailed(String),
}

pub struct PayoutOrchestrator {
    ledger: Arc<dyn Ledger>,
    registry: CampaignRegistry,
    config: PayoutConfig,
}

impl PayoutOrchestrator {
    pub fn new(ledger: Arc<dyn Ledger>, config: PayoutConfig) -> Self {
        let registry = CampaignRegistry::new(Arc::clone(&ledger));
        Self {
            ledger,
            registry,
            config,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    fn gate(&self, score: &ReviewScore) -> Result<(), SettleError> {
        match evaluate(score, &self.config.thresholds) {
            Eligibility::Eligible => Ok(()),
            Eligibility::Ineligible(reason) => Err(SettleError::Ineligible(reason)),
        }
    }

    /// Flat reward: gate, then one ERC-20 transfer under the service key.
    pub async fn settle_direct(
        &self,
        request: DirectRequest,
    ) -> Result<DirectPayout, SettleError> {
        self.gate(&request.score)?;

        let tx_hash = self
            .ledger
            .transfer(
                &self.config.reward_token,
                &request.address,
                self.config.reward_amount,
            )
            .await
            .map_err(|err| {
                warn!(to = %request.address, error = %err, "flat reward transfer failed");
                SettleError::RewardFailed(err.to_string())
            })?;

        info!(to = %request.address, tx_hash = %tx_hash, "flat reward settled");
        Ok(DirectPayout {
            review_hash: request.review_hash,
            tx_hash,
        })
    }

    /// Campaign payout: gate, membership, brand authorization, then
    /// `payReward` sized by the overall score.
    pub async fn settle_campaign(
        &self,
        request: CampaignRequest,
    ) -> Result<CampaignPayout, SettleError> {
        self.gate(&request.score)?;

        if !self
            .registry
            .contains(&request.campaign)
            .await
            .map_err(|err| SettleError::PayRewardFailed(err.to_string()))?
        {
            return Err(SettleError::CampaignNotFound(request.campaign));
        }

        let brand = self
            .ledger
            .campaign_brand(&request.campaign)
            .await
            .map_err(|err| SettleError::PayRewardFailed(err.to_string()))?;
        let signer = self.ledger.signer();
        if signer != &brand {
            return Err(SettleError::UnauthorizedNotBrand {
                signer: signer.clone(),
                brand,
            });
        }

        let score = request.score.overall();
        match self
            .ledger
            .pay_reward(&request.campaign, &request.user, score)
            .await
        {
            Ok(tx_hash) => {
                info!(
                    campaign = %request.campaign,
                    user = %request.user,
                    score,
                    tx_hash = %tx_hash,
                    "campaign reward settled"
                );
                let review_hash = tx_hash.chars().take(10).collect();
                Ok(CampaignPayout {
                    tx_hash,
                    campaign: request.campaign,
                    user: request.user,
                    score,
                    review_hash,
                })
            }
            Err(LedgerError::Reverted { reason, message }) => {
                warn!(campaign = %request.campaign, reason = ?reason, "campaign payout reverted");
                Err(match reason {
                    RevertReason::InsufficientBudget => SettleError::InsufficientBudget,
                    RevertReason::AlreadyParticipated => SettleError::AlreadyClaimed,
                    RevertReason::MaxParticipantsReached => SettleError::CampaignFull,
                    RevertReason::CampaignNotActive => SettleError::CampaignNotActive,
                    RevertReason::Unknown => SettleError::PayRewardFailed(message),
                })
            }
            Err(err) => {
                warn!(campaign = %request.campaign, error = %err, "campaign payout failed");
                Err(SettleError::PayRewardFailed(err.to_string()))
            }
        }
    }
}
