//! EVM JSON-RPC implementation of [`Ledger`] under the service signing key.
//!
//! Contract bindings are generated from the published method contract; every
//! write is sent via a `SignerMiddleware` and awaited for one confirmation.

use crate::{CampaignInfo, Ledger, LedgerError, RevertReason};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::core::types::{Address, U256};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use reward_core::EthAddress;
use std::sync::Arc;
use tracing::info;

abigen!(
    CampaignFactory,
    r#"[
        function getAllCampaigns() external view returns (address[] memory)
        function getBrandCampaigns(address brand) external view returns (address[] memory)
    ]"#
);

abigen!(
    ReviewCampaign,
    r#"[
        function getCampaignInfo() external view returns (address, uint256, uint256, uint256, uint256, uint256, uint256, uint256, bool)
        function rulesHash() external view returns (bytes32)
        function maxPayoutPerReview() external view returns (uint256)
        function brand() external view returns (address)
        function pyusdToken() external view returns (address)
        function payReward(address user, uint256 score)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function transfer(address to, uint256 value) external returns (bool)
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Debug, Clone)]
pub struct EthLedgerConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub factory_address: EthAddress,
    /// Hex-encoded signing key for all outbound writes.
    pub private_key: String,
}

pub struct EthLedger {
    client: Arc<SignerClient>,
    factory: CampaignFactory<SignerClient>,
    signer: EthAddress,
}

impl EthLedger {
    pub fn new(config: &EthLedgerConfig) -> Result<Self, LedgerError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| LedgerError::Config(format!("invalid rpc url: {e}")))?;
        let wallet = config
            .private_key
            .parse::<LocalWallet>()
            .map_err(|e| LedgerError::Config(format!("invalid signing key: {e}")))?
            .with_chain_id(config.chain_id);
        let signer = EthAddress::from_bytes(wallet.address().as_fixed_bytes());

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let factory = CampaignFactory::new(to_h160(&config.factory_address)?, Arc::clone(&client));

        info!(signer = %signer, factory = %config.factory_address, "ledger client ready");
        Ok(Self {
            client,
            factory,
            signer,
        })
    }

    fn campaign_at(&self, campaign: &EthAddress) -> Result<ReviewCampaign<SignerClient>, LedgerError> {
        Ok(ReviewCampaign::new(
            to_h160(campaign)?,
            Arc::clone(&self.client),
        ))
    }
}

#[async_trait]
impl Ledger for EthLedger {
    fn signer(&self) -> &EthAddress {
        &self.signer
    }

    async fn all_campaigns(&self) -> Result<Vec<EthAddress>, LedgerError> {
        let addresses = self
            .factory
            .get_all_campaigns()
            .call()
            .await
            .map_err(|e| classify("getAllCampaigns", e))?;
        Ok(addresses.iter().map(from_h160).collect())
    }

    async fn brand_campaigns(&self, brand: &EthAddress) -> Result<Vec<EthAddress>, LedgerError> {
        let addresses = self
            .factory
            .get_brand_campaigns(to_h160(brand)?)
            .call()
            .await
            .map_err(|e| classify("getBrandCampaigns", e))?;
        Ok(addresses.iter().map(from_h160).collect())
    }

    async fn campaign_info(&self, campaign: &EthAddress) -> Result<CampaignInfo, LedgerError> {
        let (
            brand,
            total_budget,
            remaining_budget,
            total_paid_out,
            participant_count,
            max_participants,
            start_time,
            end_time,
            is_active,
        ) = self
            .campaign_at(campaign)?
            .get_campaign_info()
            .call()
            .await
            .map_err(|e| classify("getCampaignInfo", e))?;
        Ok(CampaignInfo {
            brand: from_h160(&brand),
            total_budget: total_budget.to_string(),
            remaining_budget: remaining_budget.to_string(),
            total_paid_out: total_paid_out.to_string(),
            participant_count: to_u64(participant_count),
            max_participants: to_u64(max_participants),
            start_time: to_u64(start_time),
            end_time: to_u64(end_time),
            is_active,
        })
    }

    async fn rules_hash(&self, campaign: &EthAddress) -> Result<String, LedgerError> {
        let digest = self
            .campaign_at(campaign)?
            .rules_hash()
            .call()
            .await
            .map_err(|e| classify("rulesHash", e))?;
        Ok(format!("0x{}", hex::encode(digest)))
    }

    async fn max_payout_per_review(&self, campaign: &EthAddress) -> Result<String, LedgerError> {
        let amount = self
            .campaign_at(campaign)?
            .max_payout_per_review()
            .call()
            .await
            .map_err(|e| classify("maxPayoutPerReview", e))?;
        Ok(amount.to_string())
    }

    async fn reward_token(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError> {
        let token = self
            .campaign_at(campaign)?
            .pyusd_token()
            .call()
            .await
            .map_err(|e| classify("pyusdToken", e))?;
        Ok(from_h160(&token))
    }

    async fn campaign_brand(&self, campaign: &EthAddress) -> Result<EthAddress, LedgerError> {
        let brand = self
            .campaign_at(campaign)?
            .brand()
            .call()
            .await
            .map_err(|e| classify("brand", e))?;
        Ok(from_h160(&brand))
    }

    async fn pay_reward(
        &self,
        campaign: &EthAddress,
        user: &EthAddress,
        score: u8,
    ) -> Result<String, LedgerError> {
        let contract = self.campaign_at(campaign)?;
        let call = contract.pay_reward(to_h160(user)?, U256::from(u64::from(score)));
        let pending = call.send().await.map_err(|e| classify("payReward", e))?;
        let receipt = pending
            .await
            .map_err(|e| classify("payReward confirmation", e))?
            .ok_or_else(|| {
                LedgerError::Protocol("payReward transaction dropped from mempool".to_string())
            })?;
        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        info!(campaign = %campaign, user = %user, score, tx_hash = %tx_hash, "payReward confirmed");
        Ok(tx_hash)
    }

    async fn transfer(
        &self,
        token: &EthAddress,
        to: &EthAddress,
        amount: u128,
    ) -> Result<String, LedgerError> {
        let contract = Erc20::new(to_h160(token)?, Arc::clone(&self.client));
        let call = contract.transfer(to_h160(to)?, U256::from(amount));
        let pending = call.send().await.map_err(|e| classify("transfer", e))?;
        let receipt = pending
            .await
            .map_err(|e| classify("transfer confirmation", e))?
            .ok_or_else(|| {
                LedgerError::Protocol("transfer transaction dropped from mempool".to_string())
            })?;
        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        info!(token = %token, to = %to, amount, tx_hash = %tx_hash, "transfer confirmed");
        Ok(tx_hash)
    }
}

fn to_h160(address: &EthAddress) -> Result<Address, LedgerError> {
    address
        .as_str()
        .parse::<Address>()
        .map_err(|e| LedgerError::Protocol(format!("unparseable address {address}: {e}")))
}

fn from_h160(address: &Address) -> EthAddress {
    EthAddress::from_bytes(address.as_fixed_bytes())
}

fn to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn classify(context: &str, err: impl std::fmt::Display) -> LedgerError {
    let message = format!("{context}: {err}");
    match RevertReason::from_message(&message) {
        RevertReason::Unknown => LedgerError::Network(message),
        reason => LedgerError::Reverted { reason, message },
    }
}
