//! Read-through campaign registry.
//!
//! Resolves factory-listed campaign addresses into fully-populated
//! [`Campaign`] entities. There is no cache: every call re-reads the
//! ledger, and a resolved campaign can be stale the instant it returns.

use reward_core::{Campaign, EthAddress};
use reward_ledger::{Ledger, LedgerError};
use std::sync::Arc;

pub struct CampaignRegistry {
    ledger: Arc<dyn Ledger>,
}

impl CampaignRegistry {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Every campaign known to the factory, fully resolved.
    pub async fn list_all(&self) -> Result<Vec<Campaign>, LedgerError> {
        let addresses = self.ledger.all_campaigns().await?;
        self.resolve_all(addresses).await
    }

    /// Campaigns created by `brand`, fully resolved.
    pub async fn list_by_brand(&self, brand: &EthAddress) -> Result<Vec<Campaign>, LedgerError> {
        let addresses = self.ledger.brand_campaigns(brand).await?;
        self.resolve_all(addresses).await
    }

    /// Whether `campaign` belongs to the factory's campaign set.
    ///
    /// Address comparison is case-insensitive because `EthAddress` is
    /// lowercase-normalized on both sides.
    pub async fn contains(&self, campaign: &EthAddress) -> Result<bool, LedgerError> {
        let addresses = self.ledger.all_campaigns().await?;
        Ok(addresses.iter().any(|addr| addr == campaign))
    }

    /// Resolve one address into a campaign entity.
    ///
    /// The four per-campaign reads form one atomic view: if any read fails
    /// the whole resolution fails, never a partial campaign.
    pub async fn resolve(&self, address: &EthAddress) -> Result<Campaign, LedgerError> {
        let (info, rules_hash, max_payout_per_review, pyusd_token) = tokio::try_join!(
            self.ledger.campaign_info(address),
            self.ledger.rules_hash(address),
            self.ledger.max_payout_per_review(address),
            self.ledger.reward_token(address),
        )?;
        Ok(Campaign {
            address: address.clone(),
            brand: info.brand,
            total_budget: info.total_budget,
            remaining_budget: info.remaining_budget,
            total_paid_out: info.total_paid_out,
            participant_count: info.participant_count,
            max_participants: info.max_participants,
            start_time: info.start_time,
            end_time: info.end_time,
            is_active: info.is_active,
            max_payout_per_review,
            rules_hash,
            pyusd_token,
        })
    }

    async fn resolve_all(
        &self,
        addresses: Vec<EthAddress>,
    ) -> Result<Vec<Campaign>, LedgerError> {
        let mut campaigns = Vec::with_capacity(addresses.len());
        for address in &addresses {
            campaigns.push(self.resolve(address).await?);
        }
        Ok(campaigns)
    }
}
