#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::cast_precision_loss)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::cast_sign_loss)]
#![deny(clippy::disallowed_types)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use clap::Parser;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use reward_core::{EthAddress, Thresholds};
use reward_engine::api::{
    ApiError, HealthResponse, PayRewardRequest, RegisterCampaignRequest, RewardRequest,
    StoreTokenRequest,
};
use reward_engine::{ContractAddresses, PayoutConfig, SettlementService, SystemClock};
use reward_ledger::{EthLedger, EthLedgerConfig, Ledger, LedgerError};
use serde::Serialize;
use thiserror::Error;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Reward settlement node")]
pub struct Settings {
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: String,
    #[arg(long, env = "CAMPAIGN_FACTORY_ADDRESS")]
    pub factory_address: String,
    #[arg(long, env = "REWARD_TOKEN_ADDRESS")]
    pub token_address: String,
    #[arg(long, env = "SETTLER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
    #[arg(long, env = "CHAIN_ID", default_value_t = 11_155_111)]
    pub chain_id: u64,
    #[arg(long, env = "QUALITY_THRESHOLD", default_value_t = 70)]
    pub quality_min: u8,
    #[arg(long, env = "SPAM_THRESHOLD", default_value_t = 30)]
    pub spam_max: u8,
    /// Flat reward size in the token's smallest unit (1 PYUSD at 6 decimals).
    #[arg(long, env = "REWARD_AMOUNT", default_value_t = 1_000_000)]
    pub reward_amount: u128,
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8787")]
    pub listen_addr: String,
}

#[derive(Debug, Error)]
enum NodeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("server error: {0}")]
    Server(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct Metrics {
    registry: Registry,
    uptime_ms: IntGauge,
    store_size: IntGauge,
    tokens_stored: IntCounter,
    rewards_settled: IntCounter,
    payouts_settled: IntCounter,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();
        let uptime_ms = IntGauge::with_opts(Opts::new(
            "reward_uptime_ms",
            "Uptime of the settlement node in milliseconds",
        ))
        .expect("uptime gauge");
        let store_size = IntGauge::with_opts(Opts::new(
            "reward_credential_store_size",
            "Live entries in the credential store",
        ))
        .expect("store gauge");
        let tokens_stored = IntCounter::with_opts(Opts::new(
            "reward_tokens_stored_total",
            "Credentials accepted into the store",
        ))
        .expect("tokens counter");
        let rewards_settled = IntCounter::with_opts(Opts::new(
            "reward_flat_settlements_total",
            "Flat reward transfers settled",
        ))
        .expect("rewards counter");
        let payouts_settled = IntCounter::with_opts(Opts::new(
            "reward_campaign_settlements_total",
            "Campaign payouts settled",
        ))
        .expect("payouts counter");
        registry
            .register(Box::new(uptime_ms.clone()))
            .expect("register uptime");
        registry
            .register(Box::new(store_size.clone()))
            .expect("register store size");
        registry
            .register(Box::new(tokens_stored.clone()))
            .expect("register tokens stored");
        registry
            .register(Box::new(rewards_settled.clone()))
            .expect("register rewards");
        registry
            .register(Box::new(payouts_settled.clone()))
            .expect("register payouts");
        Self {
            registry,
            uptime_ms,
            store_size,
            tokens_stored,
            rewards_settled,
            payouts_settled,
        }
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<SettlementService>,
    start_instant: Instant,
    metrics: Metrics,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = ErrorBody {
                error: err.error_code(),
                message: err.message().map(str::to_string),
            };
            (status, Json(body)).into_response()
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "node terminated with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), NodeError> {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    info!(
        rpc_url = %settings.rpc_url,
        chain_id = settings.chain_id,
        listen_addr = %settings.listen_addr,
        "starting reward-node"
    );

    let factory = EthAddress::parse(&settings.factory_address)
        .map_err(|e| NodeError::Config(format!("invalid factory address: {e}")))?;
    let reward_token = EthAddress::parse(&settings.token_address)
        .map_err(|e| NodeError::Config(format!("invalid token address: {e}")))?;

    let ledger = Arc::new(EthLedger::new(&EthLedgerConfig {
        rpc_url: settings.rpc_url.clone(),
        chain_id: settings.chain_id,
        factory_address: factory.clone(),
        private_key: settings.private_key.clone(),
    })?);
    info!(signer = %ledger.signer(), "settlement signer loaded");

    let service = Arc::new(SettlementService::start(
        ledger as Arc<dyn Ledger>,
        PayoutConfig {
            thresholds: Thresholds {
                quality_min: settings.quality_min,
                spam_max: settings.spam_max,
            },
            reward_token: reward_token.clone(),
            reward_amount: settings.reward_amount,
        },
        ContractAddresses {
            factory,
            pyusd: reward_token,
            chain_id: settings.chain_id,
        },
        Arc::new(SystemClock),
    ));

    let state = AppState {
        service,
        start_instant: Instant::now(),
        metrics: Metrics::new(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/token/store", post(store_token))
        .route("/token/:token", get(exchange_token))
        .route("/reward", post(reward))
        .route("/payReward", post(pay_reward))
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/campaigns/brand/:address", get(brand_campaigns))
        .route("/api/campaigns/register", post(register_campaign))
        .route("/api/contracts", get(contracts))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .map_err(|e| NodeError::Config(format!("invalid listen addr: {e}")))?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| NodeError::Server(e.to_string()))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn store_token(
    State(state): State<AppState>,
    payload: Result<Json<StoreTokenRequest>, JsonRejection>,
) -> Response {
    // A storage body that does not deserialize is indistinguishable from
    // missing fields from the client's point of view.
    let Ok(Json(request)) = payload else {
        return respond::<()>(Err(ApiError::MissingFields));
    };
    let result = state.service.store_token(request);
    if result.is_ok() {
        state.metrics.tokens_stored.inc();
    }
    respond(result)
}

async fn exchange_token(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    respond(state.service.exchange_token(&token))
}

async fn reward(
    State(state): State<AppState>,
    payload: Result<Json<RewardRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return respond::<()>(Err(ApiError::InvalidRequest(rejection.body_text())))
        }
    };
    let result = state.service.reward(request).await;
    if result.is_ok() {
        state.metrics.rewards_settled.inc();
    }
    respond(result)
}

async fn pay_reward(
    State(state): State<AppState>,
    payload: Result<Json<PayRewardRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return respond::<()>(Err(ApiError::InvalidRequest(rejection.body_text())))
        }
    };
    let result = state.service.pay_reward(request).await;
    if result.is_ok() {
        state.metrics.payouts_settled.inc();
    }
    respond(result)
}

async fn list_campaigns(State(state): State<AppState>) -> Response {
    respond(state.service.list_campaigns().await)
}

async fn brand_campaigns(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    respond(state.service.brand_campaigns(&address).await)
}

async fn register_campaign(
    State(state): State<AppState>,
    payload: Result<Json<RegisterCampaignRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return respond::<()>(Err(ApiError::InvalidRequest(rejection.body_text())))
        }
    };
    respond(state.service.register_campaign(request).await)
}

async fn contracts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.contracts())
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_millis = state.start_instant.elapsed().as_millis();
    let uptime_ms = i64::try_from(uptime_millis).unwrap_or(i64::MAX);
    state.metrics.uptime_ms.set(uptime_ms);
    let store_size = i64::try_from(state.service.store_ref().len()).unwrap_or(i64::MAX);
    state.metrics.store_size.set(store_size);

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("encode metrics");
    (StatusCode::OK, buffer)
}
