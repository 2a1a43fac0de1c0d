//! Wire types and the error taxonomy for the settlement service.
//!
//! Every failure is resolved to a flat `{"error": <kind>}` shape at the
//! HTTP boundary; [`ApiError`] carries the status code and error code for
//! each kind, and an optional operator-facing message for 5xx responses.

use crate::orchestrator::SettleError;
use crate::store::ExchangeError;
use reward_core::{Campaign, EthAddress, RejectReason, ReviewScore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ========== Request Types ==========

/// Score object as sent by clients; validated into a [`ReviewScore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBody {
    pub quality: u32,
    pub spam: u32,
    pub sentiment: u32,
    pub explanation: String,
}

impl ScoreBody {
    pub(crate) fn into_score(self) -> Result<ReviewScore, ApiError> {
        ReviewScore::new(self.quality, self.spam, self.sentiment, self.explanation)
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))
    }
}

/// `POST /token/store` — called by the extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTokenRequest {
    pub token: String,
    pub review: String,
    pub score: ScoreBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_address: Option<String>,
}

/// `POST /reward` — flat reward settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRequest {
    pub address: String,
    pub review_hash: String,
    pub score: ScoreBody,
}

/// `POST /payReward` — campaign-budgeted settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRewardRequest {
    pub campaign_address: String,
    pub user_address: String,
    pub review: String,
    pub score: ScoreBody,
}

/// `POST /api/campaigns/register` — called after on-chain creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCampaignRequest {
    pub campaign_address: String,
    pub tx_hash: String,
    pub brand_address: String,
}

// ========== Response Types ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTokenResponse {
    pub ok: bool,
    pub review: String,
    pub score: ReviewScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_address: Option<EthAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResponse {
    pub ok: bool,
    pub review_hash: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRewardResponse {
    pub ok: bool,
    pub tx_hash: String,
    pub campaign_address: EthAddress,
    pub user_address: EthAddress,
    pub score: u8,
    pub review_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCampaignResponse {
    pub ok: bool,
    pub campaign_address: EthAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsResponse {
    pub factory_address: EthAddress,
    pub pyusd_address: EthAddress,
    pub chain_id: String,
}

// ========== Error Type ==========

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing required fields")]
    MissingFields,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid address")]
    InvalidAddress,
    #[error("token not found")]
    TokenNotFound,
    #[error("token expired")]
    TokenExpired,
    #[error("review quality below threshold")]
    LowQuality,
    #[error("review spam above threshold")]
    HighSpam,
    #[error("signer is not the campaign brand")]
    UnauthorizedNotBrand,
    #[error("campaign not found")]
    CampaignNotFound,
    #[error("insufficient campaign budget")]
    InsufficientCampaignBudget,
    #[error("user already claimed from this campaign")]
    UserAlreadyClaimed,
    #[error("campaign participant cap reached")]
    CampaignFull,
    #[error("campaign is not active")]
    CampaignNotActive,
    #[error("reward transfer failed: {0}")]
    RewardFailed(String),
    #[error("campaign payout failed: {0}")]
    PayRewardFailed(String),
    #[error("campaign listing failed: {0}")]
    CampaignListFailed(String),
    #[error("brand campaign listing failed: {0}")]
    CampaignBrandFailed(String),
    #[error("campaign registration failed: {0}")]
    CampaignRegisterFailed(String),
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingFields
            | ApiError::InvalidRequest(_)
            | ApiError::InvalidAddress
            | ApiError::InsufficientCampaignBudget
            | ApiError::UserAlreadyClaimed
            | ApiError::CampaignFull
            | ApiError::CampaignNotActive => 400,
            ApiError::LowQuality | ApiError::HighSpam | ApiError::UnauthorizedNotBrand => 403,
            ApiError::TokenNotFound | ApiError::CampaignNotFound => 404,
            ApiError::TokenExpired => 410,
            ApiError::RewardFailed(_)
            | ApiError::PayRewardFailed(_)
            | ApiError::CampaignListFailed(_)
            | ApiError::CampaignBrandFailed(_)
            | ApiError::CampaignRegisterFailed(_) => 500,
        }
    }

    /// Stable error code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingFields => "missing_fields",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::InvalidAddress => "invalid_address",
            ApiError::TokenNotFound => "token_not_found",
            ApiError::TokenExpired => "token_expired",
            ApiError::LowQuality => "low_quality",
            ApiError::HighSpam => "high_spam",
            ApiError::UnauthorizedNotBrand => "unauthorized_not_brand",
            ApiError::CampaignNotFound => "campaign_not_found",
            ApiError::InsufficientCampaignBudget => "insufficient_campaign_budget",
            ApiError::UserAlreadyClaimed => "user_already_claimed",
            ApiError::CampaignFull => "campaign_full",
            ApiError::CampaignNotActive => "campaign_not_active",
            ApiError::RewardFailed(_) => "reward_failed",
            ApiError::PayRewardFailed(_) => "pay_reward_failed",
            ApiError::CampaignListFailed(_) => "campaign_list_failed",
            ApiError::CampaignBrandFailed(_) => "campaign_brand_failed",
            ApiError::CampaignRegisterFailed(_) => "campaign_register_failed",
        }
    }

    /// Diagnostic detail attached to the response body, where one exists.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::InvalidRequest(m)
            | ApiError::RewardFailed(m)
            | ApiError::PayRewardFailed(m)
            | ApiError::CampaignListFailed(m)
            | ApiError::CampaignBrandFailed(m)
            | ApiError::CampaignRegisterFailed(m) => Some(m),
            _ => None,
        }
    }
}

impl From<SettleError> for ApiError {
    fn from(err: SettleError) -> Self {
        match err {
            SettleError::Ineligible(RejectReason::LowQuality) => ApiError::LowQuality,
            SettleError::Ineligible(RejectReason::HighSpam) => ApiError::HighSpam,
            SettleError::CampaignNotFound(_) => ApiError::CampaignNotFound,
            SettleError::UnauthorizedNotBrand { .. } => ApiError::UnauthorizedNotBrand,
            SettleError::InsufficientBudget => ApiError::InsufficientCampaignBudget,
            SettleError::AlreadyClaimed => ApiError::UserAlreadyClaimed,
            SettleError::CampaignFull => ApiError::CampaignFull,
            SettleError::CampaignNotActive => ApiError::CampaignNotActive,
            SettleError::RewardFailed(m) => ApiError::RewardFailed(m),
            SettleError::PayRewardFailed(m) => ApiError::PayRewardFailed(m),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::NotFound => ApiError::TokenNotFound,
            ExchangeError::Expired => ApiError::TokenExpired,
        }
    }
}

// ========== Validation Helpers ==========

pub(crate) fn parse_address(value: &str) -> Result<EthAddress, ApiError> {
    EthAddress::parse(value)
        .map_err(|_| ApiError::InvalidRequest(format!("invalid address: {value}")))
}

pub(crate) fn validate_tx_hash(value: &str) -> Result<(), ApiError> {
    let hex_part = value.strip_prefix("0x").unwrap_or("");
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::InvalidRequest(format!(
            "invalid tx hash: {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_tables_agree_with_the_contract() {
        let cases: Vec<(ApiError, u16, &str)> = vec![
            (ApiError::MissingFields, 400, "missing_fields"),
            (
                ApiError::InvalidRequest("x".to_string()),
                400,
                "invalid_request",
            ),
            (ApiError::InvalidAddress, 400, "invalid_address"),
            (ApiError::TokenNotFound, 404, "token_not_found"),
            (ApiError::TokenExpired, 410, "token_expired"),
            (ApiError::LowQuality, 403, "low_quality"),
            (ApiError::HighSpam, 403, "high_spam"),
            (
                ApiError::UnauthorizedNotBrand,
                403,
                "unauthorized_not_brand",
            ),
            (ApiError::CampaignNotFound, 404, "campaign_not_found"),
            (
                ApiError::InsufficientCampaignBudget,
                400,
                "insufficient_campaign_budget",
            ),
            (ApiError::UserAlreadyClaimed, 400, "user_already_claimed"),
            (ApiError::CampaignFull, 400, "campaign_full"),
            (ApiError::CampaignNotActive, 400, "campaign_not_active"),
            (
                ApiError::RewardFailed("x".to_string()),
                500,
                "reward_failed",
            ),
            (
                ApiError::PayRewardFailed("x".to_string()),
                500,
                "pay_reward_failed",
            ),
            (
                ApiError::CampaignListFailed("x".to_string()),
                500,
                "campaign_list_failed",
            ),
            (
                ApiError::CampaignBrandFailed("x".to_string()),
                500,
                "campaign_brand_failed",
            ),
            (
                ApiError::CampaignRegisterFailed("x".to_string()),
                500,
                "campaign_register_failed",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.error_code(), code, "{err}");
        }
    }

    #[test]
    fn five_xx_errors_carry_a_message() {
        assert_eq!(
            ApiError::PayRewardFailed("boom".to_string()).message(),
            Some("boom")
        );
        assert_eq!(ApiError::LowQuality.message(), None);
    }

    #[test]
    fn exchange_errors_convert() {
        assert_eq!(
            ApiError::from(ExchangeError::NotFound).error_code(),
            "token_not_found"
        );
        assert_eq!(
            ApiError::from(ExchangeError::Expired).error_code(),
            "token_expired"
        );
    }

    #[test]
    fn score_body_bounds_are_enforced() {
        let bad = ScoreBody {
            quality: 150,
            spam: 10,
            sentiment: 70,
            explanation: "x".to_string(),
        };
        assert!(matches!(
            bad.into_score(),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn requests_deserialize_camel_case() {
        let request: PayRewardRequest = serde_json::from_str(
            r#"{
                "campaignAddress": "0x1111111111111111111111111111111111111111",
                "userAddress": "0x2222222222222222222222222222222222222222",
                "review": "A thoughtful review",
                "score": {"quality": 85, "spam": 10, "sentiment": 70, "explanation": "ok"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            request.campaign_address,
            "0x1111111111111111111111111111111111111111"
        );
        assert_eq!(request.score.quality, 85);

        // campaignAddress is optional on token storage.
        let request: StoreTokenRequest = serde_json::from_str(
            r#"{
                "token": "abc",
                "review": "Great product",
                "score": {"quality": 85, "spam": 10, "sentiment": 70, "explanation": "ok"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.campaign_address, None);
    }

    #[test]
    fn responses_serialize_camel_case() {
        let response = RewardResponse {
            ok: true,
            review_hash: "0xabc123".to_string(),
            tx_hash: "0xdead".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["reviewHash"], "0xabc123");
        assert_eq!(json["txHash"], "0xdead");

        // A credential stored without a campaign omits the field entirely.
        let response = ExchangeTokenResponse {
            ok: true,
            review: "Great product".to_string(),
            score: ReviewScore::new(85, 10, 70, "ok").unwrap(),
            campaign_address: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("campaignAddress").is_none());
    }

    #[test]
    fn tx_hash_shape_is_checked() {
        assert!(validate_tx_hash(&format!("0x{}", "ab".repeat(32))).is_ok());
        assert!(validate_tx_hash("0x1234").is_err());
        assert!(validate_tx_hash(&"ab".repeat(33)).is_err());
    }
}
