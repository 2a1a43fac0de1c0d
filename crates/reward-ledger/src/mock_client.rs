//! Deterministic in-memory mock ledger for tests and offline smoke paths.
//!
//! Campaigns are scripted up front, failures are injected per write method,
//! and every call is counted so tests can assert that rejected requests
//! never reached the ledger.

use crate::{CampaignInfo, Ledger, LedgerError};
use async_trait::async_trait;
use reward_core::EthAddress;
use std::sync::Mutex;

const DEFAULT_TX_HASH: &str =
    "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a";

/// A scripted campaign entry.
#[derive(Debug, Clone)]
pub struct MockCampaign {
    pub info: CampaignInfo,
    pub rules_hash: String,
    pub max_payout_per_review: String,
    pub reward_token: EthAddress,
}

impl MockCampaign {
    /// An active campaign with a funded budget and room for participants.
    pub fn new(brand: EthAddress) -> Self {
        Self {
            info: CampaignInfo {
                brand,
                total_budget: "1000000".to_string(),
                remaining_budget: "800000".to_string(),
                total_paid_out: "200000".to_string(),
                participant_count: 2,
                max_participants: 100,
                start_time: 1_700_000_000,
                end_time: 1_800_000_000,
                is_active: true,
            },
            rules_hash: format!("0x{}", "11".repeat(32)),
            max_payout_per_review: "50000".to_string(),
            reward_token: EthAddress::from_bytes(&[0x33; 20]),
        }
    }
}

/// Per-method call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub all_campaigns: usize,
    pub brand_campaigns: usize,
    pub campaign_info: usize,
    pub rules_hash: usize,
    pub max_payout_per_review: usize,
    pub reward_token: usize,
    pub campaign_brand: usize,
    pub pay_reward: usize,
    pub transfer: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.all_campaigns
            + self.brand_campaigns
            + self.campaign_info
            + self.rules_hash
            + self.max_payout_per_review
            + self.reward_token
            + self.campaign_brand
            + self.pay_reward
            + self.transfer
    }
}

pub struct MockLedger {
    signer: EthAddress,
    campaigns: Mutex<Vec<(EthAddress, MockCampaign)>>,
    tx_hash: Mutex<String>,
    pay_reward_failure: Mutex<Option<LedgerError>>,
    transfer_failure: Mutex<Option<LedgerError>>,
    calls: Mutex<CallCounts>,
}

impl MockLedger {
    pub fn new(signer: EthAddress) -> Self {
        Self {
            signer,
            campaigns: Mutex::new(Vec::new()),
            tx_hash: Mutex::new(DEFAULT_TX_HASH.to_string()),
            pay_reward_failure: Mutex::new(None),
            transfer_failure: Mutex::new(None),
            calls: Mutex::new(CallCounts::default()),
        }
    }

    pub fn add_campaign(&self, address: EthAddress, campaign: MockCampaign) {
        self.campaigns
            .lock()
            .expect("mutex poisoned")
            .push((address, campaign));
    }

    /// Hash returned by subsequent successful writes.
    pub fn set_tx_hash(&self, tx_hash: impl Into<String>) {
        *self.tx_hash.lock().expect("mutex poisoned") = tx_hash.into();
    }

    /// Every subsequent `pay_reward` returns this error.
    pub fn fail_pay_reward(&self, err: LedgerError) {
        *self.pay_reward_failure.lock().expect("mutex poisoned") = Some(err);
    }

    /// Every subsequent `transfer` returns this error.
    pub fn fail_transfer(&self, err: LedgerError) {
        *self.transfer_failure.lock().expect("mutex poisoned") = Some(err);
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.lock().expect("mutex poisoned")
    }

    fn bump(&self, f: impl FnOnce(&mut CallCounts)) {
        f(&mut self.calls.lock().expect("mutex poisoned"));
    }

    fn lookup(&self, campaign: &EthAddress) -> Result<MockCampaign, LedgerError> {
        self.campaigns
            .lock()
            .expect("mutex poisoned")
            .iter()
            .find(|(addr, _)| addr == campaign)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| LedgerError::Protocol(format!("no contract at {campaign}")))
    }

    fn current_tx_hash(&self) -> String {
        self.tx_hash.lock().expect("mutex poisoned").clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn signer(&self) -> &EthAddress {
        &self.signer
    }

    async fn all_campaigns(&self) -> Result<Vec<EthAddress>, LedgerError> {
        self.bump(|c| c.all_campaigns += 1);
        Ok(self
            .campaigns
            .lock()
            .expect("mutex poisoned")
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect())
    }

    async fn brand_campaigns(&self, brand: &EthAddress) -> Result<Vec<EthAddress>, LedgerError> {
        self.bump(|c| c.brand_campaigns += 1);
        Ok(self
            .campaigns
            .lock()
            .expect("mutex poisoned")
            .iter()
            .filter(|(_, c)| &c.info.brand == brand)
            .map(|(addr, _)| addr.clone())
            .collect())
    }

    async fn campaign_info(&self, campaign: &EthAddress) -> Result<CampaignInfo, LedgerError> {
        self.bump(|c| c.campaign_info += 1);
        Ok(self.lookup(campaign)?.info)
    }

    async fn rules_hash(&self, campaign: &EthAddress) -> Result<String, LedgerError> {
        self.bump(|c| c.rules_hash += 1);
        Ok(self.lookup(campaign)?.rules_hash)
    }

    async fn max_payout_per_review(&self, campaign: &EthAddress) -> Result<String, LedgerError> {
        self.bump(|c| c.max_payout_per_review += 1);
        Ok(self.lookup(campaign)?.max_payout_per_review)
    }

    async fn reward_token(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError> {
        self.bump(|c| c.reward_token += 1);
        Ok(self.lookup(campaign)?.reward_token)
    }

    async fn campaign_brand(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError> {
        self.bump(|c| c.campaign_brand += 1);
        Ok(self.lookup(campaign)?.info.brand)
    }

    async fn pay_reward(
        &self,
        campaign: &EthAddress,
        _user: &EthAddress,
        _score: u8,
    ) -> Result<String, LedgerError> {
        self.bump(|c| c.pay_reward += 1);
        self.lookup(campaign)?;
        if let Some(err) = self.pay_reward_failure.lock().expect("mutex poisoned").clone() {
            return Err(err);
        }
        Ok(self.current_tx_hash())
    }

    async fn transfer(
        &self,
        _token: &EthAddress,
        _to: &EthAddress,
        _amount: u128,
    ) -> Result<String, LedgerError> {
        self.bump(|c| c.transfer += 1);
        if let Some(err) = self.transfer_failure.lock().expect("mutex poisoned").clone() {
            return Err(err);
        }
        Ok(self.current_tx_hash())
    }
}
