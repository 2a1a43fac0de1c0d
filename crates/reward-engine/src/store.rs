//! In-memory, time-bounded credential store.
//!
//! Maps a caller-generated single-use token to a review payload for the
//! hand-off between the scoring extension and the claim page. Entries live
//! ten minutes; an expired entry is deleted lazily when exchanged and
//! eagerly by the periodic sweep, which bounds worst-case memory to the
//! entries created in the last ~11 minutes.
//!
//! The clock is constructor-injected so expiry behavior is testable without
//! wall time.

use reward_core::{EthAddress, ReviewScore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// Fixed credential lifetime: ten minutes.
pub const CREDENTIAL_TTL_MS: u64 = 10 * 60 * 1000;

/// Sweep cadence for eager expiry cleanup.
pub const SWEEP_INTERVAL_MS: u64 = 60_000;

/// Millisecond clock seam.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

/// Hand-driven clock for deterministic expiry tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// A stored review payload awaiting redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub review: String,
    pub score: ReviewScore,
    pub campaign_address: Option<EthAddress>,
    pub created_ms: u64,
    pub expires_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("token not found")]
    NotFound,
    #[error("token expired")]
    Expired,
}

pub struct CredentialStore {
    entries: Mutex<HashMap<String, Credential>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, CREDENTIAL_TTL_MS)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms,
            clock,
        }
    }

    /// Store a payload under `token`, overwriting any existing entry.
    ///
    /// Token uniqueness is the caller's responsibility (a random UUID from
    /// the extension); this layer only enforces the lifetime.
    pub fn store(
        &self,
        token: &str,
        review: String,
        score: ReviewScore,
        campaign_address: Option<EthAddress>,
    ) {
        let created_ms = self.clock.now_ms();
        let credential = Credential {
            review,
            score,
            campaign_address: campaign_address.clone(),
            created_ms,
            expires_ms: created_ms + self.ttl_ms,
        };
        self.entries
            .lock()
            .expect("mutex poisoned")
            .insert(token.to_string(), credential);
        debug!(token, campaign = ?campaign_address, "credential stored");
    }

    /// Retrieve the payload for `token`.
    ///
    /// A successful exchange does not consume the entry (the claim page may
    /// refresh); an expired entry is deleted as a side effect, so a second
    /// exchange of the same token reports `NotFound`.
    pub fn exchange(&self, token: &str) -> Result<Credential, ExchangeError> {
        let mut entries = self.entries.lock().expect("mutex poisoned");
        let credential = entries.get(token).ok_or(ExchangeError::NotFound)?;
        if credential.expires_ms < self.clock.now_ms() {
            entries.remove(token);
            debug!(token, "credential expired on exchange");
            return Err(ExchangeError::Expired);
        }
        Ok(credential.clone())
    }

    /// Remove every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.lock().expect("mutex poisoned");
        let before = entries.len();
        entries.retain(|_, credential| credential.expires_ms >= now_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn the recurring sweep task for a shared store.
pub fn spawn_sweeper(store: Arc<CredentialStore>, interval_ms: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(interval_ms));
        // The first tick fires immediately; harmless on an empty store.
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                info!(removed, "swept expired credentials");
            }
        }
    })
}
