//! Redelivery Deduplication Store
//!
//! The provider redelivers on any non-2xx or timeout, so the same event
//! identity can arrive again minutes later or concurrently. The store is
//! the single mutual-exclusion boundary in the pipeline: claim is an atomic
//! conditional insert keyed by identity, so unrelated events never contend.
//!
//! Each record carries a watch channel. The claimant publishes the final
//! outcome on it; concurrent deliveries of the same identity can await
//! settlement instead of guessing while processing is still in flight.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

use crate::event::EventIdentity;

/// Final (or in-flight) outcome recorded for an event identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Claimed by a delivery that has not finished processing yet
    Pending,
    Succeeded,
    Failed(String),
}

impl DedupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DedupOutcome::Succeeded)
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, DedupOutcome::Pending)
    }
}

#[derive(Debug)]
struct DedupRecord {
    first_seen_at: DateTime<Utc>,
    claimed_at: Instant,
    outcome_tx: watch::Sender<DedupOutcome>,
}

impl DedupRecord {
    fn fresh() -> Self {
        let (outcome_tx, _) = watch::channel(DedupOutcome::Pending);
        Self {
            first_seen_at: Utc::now(),
            claimed_at: Instant::now(),
            outcome_tx,
        }
    }
}

/// Result of attempting to claim an identity
#[derive(Debug)]
pub enum DedupClaim {
    /// First sight: the caller owns processing and must record the outcome
    Fresh,
    /// Already seen within the window; carries the outcome at claim time
    /// and a subscription for awaiting settlement
    Seen {
        outcome: DedupOutcome,
        settled: watch::Receiver<DedupOutcome>,
    },
}

#[derive(Debug, Clone)]
pub struct DedupStoreConfig {
    /// How long a recorded identity shadows redeliveries. Provider
    /// redelivery windows run minutes to a few hours.
    pub retention: Duration,
    /// Sweep interval for evicting expired records
    pub sweep_interval: Duration,
}

impl Default for DedupStoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Windowed store of processed event identities, owned by the processor
pub struct DedupStore {
    records: DashMap<EventIdentity, DedupRecord>,
    config: DedupStoreConfig,
}

impl DedupStore {
    pub fn new(config: DedupStoreConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Atomically claim an identity. Exactly one caller gets `Fresh` for a
    /// given identity within the retention window; everyone else observes
    /// the stored outcome.
    pub fn claim(&self, identity: &EventIdentity) -> DedupClaim {
        let mut seen = None;
        self.records
            .entry(identity.clone())
            .and_modify(|record| {
                if record.claimed_at.elapsed() > self.config.retention {
                    // Expired but not yet swept: reclaim in place.
                    *record = DedupRecord::fresh();
                } else {
                    seen = Some((
                        record.outcome_tx.borrow().clone(),
                        record.outcome_tx.subscribe(),
                    ));
                }
            })
            .or_insert_with(DedupRecord::fresh);

        match seen {
            Some((outcome, settled)) => DedupClaim::Seen { outcome, settled },
            None => DedupClaim::Fresh,
        }
    }

    /// Record the final outcome on a previously claimed identity, waking
    /// any deliveries awaiting settlement
    pub fn record(&self, identity: &EventIdentity, outcome: DedupOutcome) {
        if let Some(record) = self.records.get(identity) {
            record.outcome_tx.send_replace(outcome);
        }
    }

    /// Await a settled (non-pending) outcome on a subscription handed out by
    /// `claim`, up to `budget`. Returns the last observed outcome either way.
    pub async fn await_settled(
        mut settled: watch::Receiver<DedupOutcome>,
        budget: Duration,
    ) -> DedupOutcome {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let current = settled.borrow_and_update().clone();
            if current.is_settled() {
                return current;
            }
            match tokio::time::timeout_at(deadline, settled.changed()).await {
                Ok(Ok(())) => continue,
                // Sender dropped (record evicted) or budget exhausted:
                // report what we have.
                Ok(Err(_)) | Err(_) => return settled.borrow().clone(),
            }
        }
    }

    pub fn outcome(&self, identity: &EventIdentity) -> Option<DedupOutcome> {
        self.records
            .get(identity)
            .map(|r| r.outcome_tx.borrow().clone())
    }

    pub fn first_seen_at(&self, identity: &EventIdentity) -> Option<DateTime<Utc>> {
        self.records.get(identity).map(|r| r.first_seen_at)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Evict records older than the retention window
    pub fn sweep(&self) -> usize {
        let retention = self.config.retention;
        let before = self.records.len();
        self.records
            .retain(|_, record| record.claimed_at.elapsed() <= retention);
        let evicted = before - self.records.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.records.len(), "dedup sweep");
        }
        evicted
    }

    /// Owner-side handle for a freshly claimed identity. The claimant must
    /// settle through the guard; if the guard is dropped first, the claim is
    /// settled as failed on its behalf.
    pub fn guard(self: &Arc<Self>, identity: &EventIdentity) -> ClaimGuard {
        ClaimGuard {
            store: Arc::clone(self),
            identity: identity.clone(),
            settled: false,
        }
    }

    /// Run the periodic eviction sweep until the task is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let interval = store.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }
}

/// Settlement obligation for a fresh claim.
///
/// The webhook handler future is dropped whenever the provider hangs up
/// mid-request, which is its normal timeout behavior. A claim that nobody
/// settles would shadow redeliveries for the whole retention window, so the
/// guard records a failure on drop and the redelivery path sees a terminal
/// outcome instead of a claim nobody owns.
pub struct ClaimGuard {
    store: Arc<DedupStore>,
    identity: EventIdentity,
    settled: bool,
}

impl ClaimGuard {
    /// Record the final outcome and disarm the guard
    pub fn settle(mut self, outcome: DedupOutcome) {
        self.settled = true;
        self.store.record(&self.identity, outcome);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.settled {
            debug!(identity = %self.identity, "claim dropped unsettled");
            self.store.record(
                &self.identity,
                DedupOutcome::Failed("delivery cancelled before completion".to_string()),
            );
        }
    }
}
