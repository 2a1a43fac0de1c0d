//! Composition root: one method per HTTP operation.
//!
//! The service owns the credential store (and its sweeper task), the
//! campaign registry, and the payout orchestrator. Handlers in the node
//! binary stay thin: deserialize, call the matching method, map the
//! [`ApiError`] to a status code.

use crate::api::{
    parse_address, validate_tx_hash, ApiError, CampaignListResponse, ContractsResponse,
    ExchangeTokenResponse, OkResponse, PayRewardRequest, PayRewardResponse,
    RegisterCampaignRequest, RegisterCampaignResponse, RewardRequest, RewardResponse,
    StoreTokenRequest,
};
use crate::orchestrator::{CampaignRequest, DirectRequest, PayoutConfig, PayoutOrchestrator};
use crate::registry::CampaignRegistry;
use crate::store::{spawn_sweeper, Clock, CredentialStore, SWEEP_INTERVAL_MS};
use reward_core::EthAddress;
use reward_ledger::Ledger;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Minimum length accepted for a client-supplied review hash.
const MIN_REVIEW_HASH_LEN: usize = 6;

/// Minimum length accepted for review text on campaign settlement.
const MIN_REVIEW_LEN: usize = 10;

/// Deployed contract addresses surfaced to clients via `/api/contracts`.
#[derive(Debug, Clone)]
pub struct ContractAddresses {
    pub factory: EthAddress,
    pub pyusd: EthAddress,
    pub chain_id: u64,
}

pub struct SettlementService {
    store: Arc<CredentialStore>,
    registry: CampaignRegistry,
    orchestrator: PayoutOrchestrator,
    contracts: ContractAddresses,
    sweeper: JoinHandle<()>,
}

impl SettlementService {
    /// Build the service and start the periodic credential sweeper.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        ledger: Arc<dyn Ledger>,
        config: PayoutConfig,
        contracts: ContractAddresses,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(CredentialStore::new(clock));
        let sweeper = spawn_sweeper(Arc::clone(&store), SWEEP_INTERVAL_MS);
        let registry = CampaignRegistry::new(Arc::clone(&ledger));
        let orchestrator = PayoutOrchestrator::new(ledger, config);
        Self {
            store,
            registry,
            orchestrator,
            contracts,
            sweeper,
        }
    }

    pub fn store_ref(&self) -> &CredentialStore {
        &self.store
    }

    /// `POST /token/store`
    pub fn store_token(&self, request: StoreTokenRequest) -> Result<OkResponse, ApiError> {
        if request.token.is_empty() || request.review.is_empty() {
            return Err(ApiError::MissingFields);
        }
        let score = request.score.into_score()?;
        let campaign_address = match request.campaign_address.as_deref() {
            Some(raw) if !raw.is_empty() => Some(parse_address(raw)?),
            _ => None,
        };
        self.store
            .store(&request.token, request.review, score, campaign_address);
        Ok(OkResponse { ok: true })
    }

    /// `GET /token/:token`
    pub fn exchange_token(&self, token: &str) -> Result<ExchangeTokenResponse, ApiError> {
        let credential = self.store.exchange(token)?;
        Ok(ExchangeTokenResponse {
            ok: true,
            review: credential.review,
            score: credential.score,
            campaign_address: credential.campaign_address,
        })
    }

    /// `POST /reward`
    pub async fn reward(&self, request: RewardRequest) -> Result<RewardResponse, ApiError> {
        if request.address.is_empty() || request.review_hash.is_empty() {
            return Err(ApiError::MissingFields);
        }
        let address = parse_address(&request.address)?;
        if request.review_hash.len() < MIN_REVIEW_HASH_LEN {
            return Err(ApiError::InvalidRequest(
                "review hash too short".to_string(),
            ));
        }
        let score = request.score.into_score()?;
        let payout = self
            .orchestrator
            .settle_direct(DirectRequest {
                address,
                review_hash: request.review_hash,
                score,
            })
            .await?;
        Ok(RewardResponse {
            ok: true,
            review_hash: payout.review_hash,
            tx_hash: payout.tx_hash,
        })
    }

    /// `POST /payReward`
    pub async fn pay_reward(
        &self,
        request: PayRewardRequest,
    ) -> Result<PayRewardResponse, ApiError> {
        if request.campaign_address.is_empty()
            || request.user_address.is_empty()
            || request.review.is_empty()
        {
            return Err(ApiError::MissingFields);
        }
        let campaign = parse_address(&request.campaign_address)?;
        let user = parse_address(&request.user_address)?;
        if request.review.chars().count() < MIN_REVIEW_LEN {
            return Err(ApiError::InvalidRequest("review too short".to_string()));
        }
        let score = request.score.into_score()?;
        let payout = self
            .orchestrator
            .settle_campaign(CampaignRequest {
                campaign,
                user,
                review: request.review,
                score,
            })
            .await?;
        Ok(PayRewardResponse {
            ok: true,
            tx_hash: payout.tx_hash,
            campaign_address: payout.campaign,
            user_address: payout.user,
            score: payout.score,
            review_hash: payout.review_hash,
        })
    }

    /// `GET /api/campaigns`
    pub async fn list_campaigns(&self) -> Result<CampaignListResponse, ApiError> {
        let campaigns = self
            .registry
            .list_all()
            .await
            .map_err(|err| ApiError::CampaignListFailed(err.to_string()))?;
        Ok(CampaignListResponse { campaigns })
    }

    /// `GET /api/campaigns/brand/:address`
    pub async fn brand_campaigns(&self, raw: &str) -> Result<CampaignListResponse, ApiError> {
        let brand = EthAddress::parse(raw).map_err(|_| ApiError::InvalidAddress)?;
        let campaigns = self
            .registry
            .list_by_brand(&brand)
            .await
            .map_err(|err| ApiError::CampaignBrandFailed(err.to_string()))?;
        Ok(CampaignListResponse { campaigns })
    }

    /// `POST /api/campaigns/register`
    ///
    /// Creation itself happens on-chain; this acknowledges the deployment
    /// after checking the address is actually known to the factory.
    pub async fn register_campaign(
        &self,
        request: RegisterCampaignRequest,
    ) -> Result<RegisterCampaignResponse, ApiError> {
        if request.campaign_address.is_empty()
            || request.tx_hash.is_empty()
            || request.brand_address.is_empty()
        {
            return Err(ApiError::MissingFields);
        }
        let campaign = parse_address(&request.campaign_address)?;
        let brand = parse_address(&request.brand_address)?;
        validate_tx_hash(&request.tx_hash)?;

        let known = self
            .registry
            .contains(&campaign)
            .await
            .map_err(|err| ApiError::CampaignRegisterFailed(err.to_string()))?;
        if !known {
            return Err(ApiError::CampaignNotFound);
        }

        info!(campaign = %campaign, brand = %brand, tx_hash = %request.tx_hash, "campaign registered");
        Ok(RegisterCampaignResponse {
            ok: true,
            campaign_address: campaign,
        })
    }

    /// `GET /api/contracts`
    pub fn contracts(&self) -> ContractsResponse {
        ContractsResponse {
            factory_address: self.contracts.factory.clone(),
            pyusd_address: self.contracts.pyusd.clone(),
            chain_id: self.contracts.chain_id.to_string(),
        }
    }
}

impl Drop for SettlementService {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ScoreBody;
    use crate::store::{ManualClock, CREDENTIAL_TTL_MS};
    use reward_core::Thresholds;
    use reward_ledger::{LedgerError, MockCampaign, MockLedger, RevertReason};

    fn addr(byte: u8) -> EthAddress {
        EthAddress::from_bytes(&[byte; 20])
    }

    fn score(quality: u32, spam: u32, sentiment: u32) -> ScoreBody {
        ScoreBody {
            quality,
            spam,
            sentiment,
            explanation: "well argued".to_string(),
        }
    }

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            factory: addr(0x0f),
            pyusd: addr(0x33),
            chain_id: 11_155_111,
        }
    }

    fn service_with(ledger: MockLedger) -> (SettlementService, Arc<MockLedger>, Arc<ManualClock>) {
        let ledger = Arc::new(ledger);
        let clock = Arc::new(ManualClock::new(1_000_000));
        let service = SettlementService::start(
            Arc::clone(&ledger) as Arc<dyn Ledger>,
            PayoutConfig {
                thresholds: Thresholds::default(),
                reward_token: addr(0x33),
                reward_amount: 1_000_000,
            },
            contracts(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (service, ledger, clock)
    }

    #[tokio::test]
    async fn store_exchange_then_reward_round_trip() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.set_tx_hash("0xdead");
        let (service, _ledger, _clock) = service_with(ledger);

        service
            .store_token(StoreTokenRequest {
                token: "abc".to_string(),
                review: "Great product".to_string(),
                score: score(85, 10, 70),
                campaign_address: None,
            })
            .unwrap();

        let exchanged = service.exchange_token("abc").unwrap();
        assert!(exchanged.ok);
        assert_eq!(exchanged.review, "Great product");
        assert_eq!(exchanged.score.quality, 85);
        assert_eq!(exchanged.campaign_address, None);

        let reward = service
            .reward(RewardRequest {
                address: "0x1111111111111111111111111111111111111111".to_string(),
                review_hash: "0xabc123".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap();
        assert!(reward.ok);
        assert_eq!(reward.tx_hash, "0xdead");
        assert_eq!(reward.review_hash, "0xabc123");
    }

    #[tokio::test]
    async fn low_quality_reward_is_rejected_without_ledger_calls() {
        let (service, ledger, _clock) = service_with(MockLedger::new(addr(0xaa)));

        let err = service
            .reward(RewardRequest {
                address: "0x1111111111111111111111111111111111111111".to_string(),
                review_hash: "0xabc123".to_string(),
                score: score(50, 10, 70),
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "low_quality");
        assert_eq!(err.status_code(), 403);
        assert_eq!(ledger.calls().total(), 0);
    }

    #[tokio::test]
    async fn empty_fields_are_missing_fields() {
        let (service, _ledger, _clock) = service_with(MockLedger::new(addr(0xaa)));

        let err = service
            .store_token(StoreTokenRequest {
                token: String::new(),
                review: "Great product".to_string(),
                score: score(85, 10, 70),
                campaign_address: None,
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "missing_fields");

        let err = service
            .reward(RewardRequest {
                address: String::new(),
                review_hash: "0xabc123".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "missing_fields");
    }

    #[tokio::test]
    async fn malformed_address_is_invalid_request() {
        let (service, _ledger, _clock) = service_with(MockLedger::new(addr(0xaa)));

        let err = service
            .reward(RewardRequest {
                address: "not-an-address".to_string(),
                review_hash: "0xabc123".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn expired_token_is_gone_then_unknown() {
        let (service, _ledger, clock) = service_with(MockLedger::new(addr(0xaa)));
        service
            .store_token(StoreTokenRequest {
                token: "abc".to_string(),
                review: "Great product".to_string(),
                score: score(85, 10, 70),
                campaign_address: None,
            })
            .unwrap();

        clock.advance(CREDENTIAL_TTL_MS + 1);
        let err = service.exchange_token("abc").unwrap_err();
        assert_eq!(err.error_code(), "token_expired");
        assert_eq!(err.status_code(), 410);

        let err = service.exchange_token("abc").unwrap_err();
        assert_eq!(err.error_code(), "token_not_found");
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn campaign_payout_maps_budget_revert_to_client_error() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.add_campaign(addr(0x01), MockCampaign::new(addr(0xaa)));
        ledger.fail_pay_reward(LedgerError::Reverted {
            reason: RevertReason::InsufficientBudget,
            message: "execution reverted: InsufficientBudget()".to_string(),
        });
        let (service, _ledger, _clock) = service_with(ledger);

        let err = service
            .pay_reward(PayRewardRequest {
                campaign_address: format!("0x{}", "01".repeat(20)),
                user_address: format!("0x{}", "11".repeat(20)),
                review: "A thoughtful review".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "insufficient_campaign_budget");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn campaign_payout_succeeds_with_overall_score() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.add_campaign(addr(0x01), MockCampaign::new(addr(0xaa)));
        ledger.set_tx_hash("0x1234567890abcdef");
        let (service, _ledger, _clock) = service_with(ledger);

        let payout = service
            .pay_reward(PayRewardRequest {
                campaign_address: format!("0x{}", "01".repeat(20)),
                user_address: format!("0x{}", "11".repeat(20)),
                review: "A thoughtful review".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap();

        assert!(payout.ok);
        assert_eq!(payout.score, 82);
        assert_eq!(payout.tx_hash, "0x1234567890abcdef");
        assert_eq!(payout.review_hash, "0x12345678");
    }

    #[tokio::test]
    async fn short_review_is_rejected_for_campaign_payout() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.add_campaign(addr(0x01), MockCampaign::new(addr(0xaa)));
        let (service, ledger, _clock) = service_with(ledger);

        let err = service
            .pay_reward(PayRewardRequest {
                campaign_address: format!("0x{}", "01".repeat(20)),
                user_address: format!("0x{}", "11".repeat(20)),
                review: "too short".to_string(),
                score: score(85, 10, 70),
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "invalid_request");
        assert_eq!(ledger.calls().total(), 0);
    }

    #[tokio::test]
    async fn campaign_listing_and_brand_scoping() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.add_campaign(addr(0x01), MockCampaign::new(addr(0xaa)));
        ledger.add_campaign(addr(0x02), MockCampaign::new(addr(0xbb)));
        let (service, _ledger, _clock) = service_with(ledger);

        let all = service.list_campaigns().await.unwrap();
        assert_eq!(all.campaigns.len(), 2);

        let brand = service
            .brand_campaigns("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB")
            .await
            .unwrap();
        assert_eq!(brand.campaigns.len(), 1);
        assert_eq!(brand.campaigns[0].address, addr(0x02));

        let err = service.brand_campaigns("nope").await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_address");
    }

    #[tokio::test]
    async fn registration_requires_a_factory_known_campaign() {
        let ledger = MockLedger::new(addr(0xaa));
        ledger.add_campaign(addr(0x01), MockCampaign::new(addr(0xaa)));
        let (service, _ledger, _clock) = service_with(ledger);

        let tx_hash = format!("0x{}", "ab".repeat(32));
        let ok = service
            .register_campaign(RegisterCampaignRequest {
                campaign_address: format!("0x{}", "01".repeat(20)),
                tx_hash: tx_hash.clone(),
                brand_address: format!("0x{}", "aa".repeat(20)),
            })
            .await
            .unwrap();
        assert!(ok.ok);

        let err = service
            .register_campaign(RegisterCampaignRequest {
                campaign_address: format!("0x{}", "99".repeat(20)),
                tx_hash,
                brand_address: format!("0x{}", "aa".repeat(20)),
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "campaign_not_found");
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn contracts_echoes_deployment_config() {
        let (service, _ledger, _clock) = service_with(MockLedger::new(addr(0xaa)));
        let contracts = service.contracts();
        assert_eq!(contracts.factory_address, addr(0x0f));
        assert_eq!(contracts.pyusd_address, addr(0x33));
        assert_eq!(contracts.chain_id, "11155111");
    }
}
