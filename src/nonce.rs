//! Single-use nonce store
//!
//! Nonces move through `Issued → {Consumed | Expired}`. Consumption is the only stored
//! transition; expiry is derived by comparing the validation time against `expires_at`.
//!
//! Each entry lives in a [`DashMap`] shard. Validation holds the shard's write lock for the
//! whole lookup, check and mark sequence, so two concurrent validations of the same id can
//! never both succeed, and a sweep can never remove an entry while it is being validated.

use crate::{
    config::VerifierConfig,
    crypto::{
        challenge::{generate_challenge, generate_nonce_id},
        jwt::NonceClaim,
    },
    error::NonceError,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use tokio::task::JoinHandle;

/// Minimum time between sweeps triggered by issuing into a full store, in milliseconds
const INLINE_SWEEP_INTERVAL_MS: i64 = 1_000;

#[derive(Clone, Debug)]
struct NonceEntry {
    value: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

impl NonceEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expires_at
    }
}

/// A freshly issued nonce
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce {
    pub id: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Nonce> for NonceClaim {
    fn from(nonce: Nonce) -> Self {
        Self { id: nonce.id, value: nonce.value }
    }
}

/// Issues nonces and atomically consumes them on validation
#[derive(Debug)]
pub struct NonceStore {
    entries: DashMap<String, NonceEntry>,
    validity: Duration,
    capacity: usize,
    /// Unix millis of the last sweep run from `issue_at`
    last_inline_sweep: AtomicI64,
}

impl NonceStore {
    /// Create a store whose nonces stay valid for `validity` and which holds at most
    /// `capacity` entries
    pub fn new(validity: Duration, capacity: usize) -> Self {
        Self { entries: DashMap::new(), validity, capacity, last_inline_sweep: AtomicI64::new(i64::MIN) }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(config.nonce_validity(), config.nonce_capacity)
    }

    /// Issue a new nonce valid from now until now + the validity window
    pub fn issue(&self) -> Result<Nonce, NonceError> {
        self.issue_at(Utc::now())
    }

    /// Issue a new nonce as of `now`
    ///
    /// When the store is full, consumed and expired entries are swept first, at most once per
    /// second across all callers; if it is still full the nonce is refused with
    /// `ResourceExhausted`.
    pub fn issue_at(&self, now: DateTime<Utc>) -> Result<Nonce, NonceError> {
        if self.entries.len() >= self.capacity {
            if self.claim_inline_sweep(now) {
                self.sweep_at(now);
            }
            if self.entries.len() >= self.capacity {
                tracing::warn!(capacity = self.capacity, "nonce store full, refusing to issue");
                return Err(NonceError::ResourceExhausted { capacity: self.capacity });
            }
        }

        let value = generate_challenge()?;
        let expires_at = now + self.validity;
        let id = loop {
            let id = generate_nonce_id();
            match self.entries.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(NonceEntry { value: value.clone(), expires_at, used: false });
                    break id;
                }
            }
        };

        tracing::debug!(nonce_id = %id, expires_at = %expires_at, "issued nonce");
        Ok(Nonce { id, value, expires_at })
    }

    /// Returns true for the one caller allowed to sweep from the issuance path at `now`
    fn claim_inline_sweep(&self, now: DateTime<Utc>) -> bool {
        let now_ms = now.timestamp_millis();
        let last = self.last_inline_sweep.load(Ordering::Acquire);
        now_ms.saturating_sub(last) >= INLINE_SWEEP_INTERVAL_MS
            && self
                .last_inline_sweep
                .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Validate and consume the nonce `id`
    pub fn validate(&self, id: &str, value: &str) -> Result<(), NonceError> {
        self.validate_at(id, value, Utc::now())
    }

    /// Validate and consume the nonce `id` as of `now`
    ///
    /// Checks run in order: `Unknown`, `AlreadyUsed`, `Expired`, `Mismatch`. Only a pair that
    /// passes all four is marked used; a mismatching value leaves the nonce untouched.
    pub fn validate_at(&self, id: &str, value: &str, now: DateTime<Utc>) -> Result<(), NonceError> {
        // The shard write lock is held until `entry` drops.
        let mut entry = self.entries.get_mut(id).ok_or(NonceError::Unknown)?;
        if entry.used {
            return Err(NonceError::AlreadyUsed);
        }
        if now > entry.expires_at {
            return Err(NonceError::Expired);
        }
        if entry.value != value {
            return Err(NonceError::Mismatch);
        }
        entry.used = true;
        Ok(())
    }

    /// Remove consumed and expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "swept nonces");
        }
        removed
    }

    /// Number of entries currently held, including consumed and expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }
}

/// Sweep `store` every `period` on the tokio runtime until the returned handle is aborted
pub fn spawn_sweeper(store: Arc<NonceStore>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            store.sweep();
        }
    })
}
