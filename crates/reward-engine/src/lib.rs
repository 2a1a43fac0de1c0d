#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::cast_precision_loss)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::cast_sign_loss)]
#![deny(clippy::disallowed_types)]

//! The Reward Settlement Engine.
//!
//! Brokers an ephemeral single-recipient credential between two untrusted
//! clients (the scoring extension and the claim page), enforces the
//! quality/spam eligibility gate before any funds move, and orchestrates
//! payouts against the external value ledger.
//!
//! State is process-local by design: the credential store loses everything
//! on restart, and a second instance behind a load balancer would not see
//! credentials stored on the first. This is a known single-instance
//! constraint, not something the engine papers over.

pub mod api;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod store;

pub use api::ApiError;
pub use orchestrator::{
    CampaignPayout, CampaignRequest, DirectPayout, DirectRequest, PayoutConfig,
    PayoutOrchestrator, SettleError,
};
pub use registry::CampaignRegistry;
pub use service::{ContractAddresses, SettlementService};
pub use store::{
    spawn_sweeper, Clock, Credential, CredentialStore, ExchangeError, ManualClock, SystemClock,
    CREDENTIAL_TTL_MS, SWEEP_INTERVAL_MS,
};
