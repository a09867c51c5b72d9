//! Owns the authoritative in-memory set of active subscriptions, mirrored
//! from the store.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::app::{AppContext, Result};
use crate::domain::Subscription;
use crate::feed::FeedState;
use crate::store::SubscriptionStore;

/// Result of an add request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An equal (identity, destination, kind) triple is already tracked.
    AlreadyTracking,
    /// The identity does not resolve upstream.
    UnknownIdentity,
    /// The destination rejected the reachability check.
    BadDestination,
}

/// One tracked subscription and its reconciliation state.
///
/// The subscription triple is duplicated outside the state mutex so
/// membership checks never wait on an in-flight dispatch tick.
#[derive(Clone)]
pub struct TrackedFeed {
    pub subscription: Subscription,
    pub state: Arc<Mutex<FeedState>>,
}

impl TrackedFeed {
    fn new(subscription: Subscription, memory_limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState::new(
                subscription.clone(),
                memory_limit,
            ))),
            subscription,
        }
    }
}

pub struct SubscriptionManager {
    store: Arc<dyn SubscriptionStore + Send + Sync>,
    active: Mutex<Vec<TrackedFeed>>,
    memory_limit: usize,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn SubscriptionStore + Send + Sync>, memory_limit: usize) -> Self {
        Self {
            store,
            active: Mutex::new(Vec::new()),
            memory_limit,
        }
    }

    /// Clone of the active set. The list lock is held only for the clone;
    /// callers lock each feed's state individually, so adds and removals
    /// proceed while a cycle is in flight.
    pub async fn snapshot(&self) -> Vec<TrackedFeed> {
        self.active.lock().await.clone()
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.active
            .lock()
            .await
            .iter()
            .map(|f| f.subscription.clone())
            .collect()
    }

    /// Mirror the persisted records into the active set, dropping records
    /// whose destination no longer resolves.
    ///
    /// The dropped records are deleted from the store; an unresolvable
    /// destination is the one failure that proactively removes persistent
    /// state. The feeds are seeded by the dispatcher's first cycle, which
    /// applies the usual batch pacing.
    pub async fn load(&self, ctx: &AppContext) -> Result<usize> {
        let records = self.store.list()?;
        tracing::info!("loading {} persisted subscriptions", records.len());

        let mut active = self.active.lock().await;
        for record in records {
            if !ctx.notifier.destination_ok(&record.destination).await {
                tracing::warn!(
                    "dropping {}: destination no longer resolvable",
                    record.label()
                );
                for outcome in self.store.remove(std::slice::from_ref(&record)) {
                    if let Err(e) = outcome.result {
                        tracing::warn!(
                            "could not remove {}: {}",
                            outcome.subscription.label(),
                            e
                        );
                    }
                }
                continue;
            }

            active.push(TrackedFeed::new(record, self.memory_limit));
        }

        Ok(active.len())
    }

    /// Mirror the persisted records without any reachability checks.
    ///
    /// Used by one-shot commands that only need the duplicate check, not a
    /// verified working set.
    pub async fn hydrate(&self) -> Result<usize> {
        let records = self.store.list()?;
        let mut active = self.active.lock().await;
        for record in records {
            active.push(TrackedFeed::new(record, self.memory_limit));
        }
        Ok(active.len())
    }

    /// Start tracking a subscription, persisting it on success.
    pub async fn add(&self, ctx: &AppContext, subscription: Subscription) -> Result<AddOutcome> {
        if !ctx.source.verify_identity(&subscription.identity).await? {
            return Ok(AddOutcome::UnknownIdentity);
        }
        if !ctx.notifier.destination_ok(&subscription.destination).await {
            return Ok(AddOutcome::BadDestination);
        }

        let mut active = self.active.lock().await;
        if active.iter().any(|f| f.subscription == subscription) {
            return Ok(AddOutcome::AlreadyTracking);
        }

        self.store.insert(std::slice::from_ref(&subscription))?;
        tracing::info!("tracking {}", subscription.label());
        active.push(TrackedFeed::new(subscription, self.memory_limit));

        Ok(AddOutcome::Added)
    }

    /// Stop tracking a subscription. Idempotent: removing an absent
    /// subscription reports false and is not an error.
    pub async fn remove(&self, subscription: &Subscription) -> Result<bool> {
        let mut active = self.active.lock().await;
        let before = active.len();
        active.retain(|f| f.subscription != *subscription);
        let dropped_active = active.len() < before;

        let mut dropped_stored = false;
        for outcome in self.store.remove(std::slice::from_ref(subscription)) {
            match outcome.result {
                Ok(removed) => dropped_stored = dropped_stored || removed,
                Err(e) => {
                    tracing::warn!("could not remove {}: {}", outcome.subscription.label(), e)
                }
            }
        }

        if dropped_active || dropped_stored {
            tracing::info!("stopped tracking {}", subscription.label());
        }

        Ok(dropped_active || dropped_stored)
    }
}
