//! Per-subscription feed reconciliation.
//!
//! [`FeedState`] decides which fetched items are genuinely new, in what
//! order they are announced, and how much history is retained. The windows
//! live in memory only; after a restart the first fetch re-seeds them
//! without announcing anything.

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Activity, Subscription};
use crate::notifier::Delivery;
use crate::source::ActivitySource;

/// Receives one pending item for delivery.
///
/// The dispatcher wraps the configured [`Notifier`](crate::notifier::Notifier)
/// in a sink that applies the destination's channel filter first.
#[async_trait]
pub trait ItemSink {
    async fn deliver(&self, item: &Activity) -> Result<Delivery>;
}

/// Reconciliation window for one subscription.
///
/// `processed` holds already-announced items newest-first, `pending` holds
/// detected-but-unannounced items; both are bounded to `memory_limit`
/// entries. An item moves from `pending` to `processed` exactly once.
pub struct FeedState {
    subscription: Subscription,
    processed: Vec<Activity>,
    pending: Vec<Activity>,
    initialized: bool,
    consecutive_errors: u32,
    memory_limit: usize,
}

impl FeedState {
    pub fn new(subscription: Subscription, memory_limit: usize) -> Self {
        Self {
            subscription,
            processed: Vec::new(),
            pending: Vec::new(),
            initialized: false,
            consecutive_errors: 0,
            memory_limit,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn processed_ids(&self) -> Vec<i64> {
        self.processed.iter().map(|a| a.id).collect()
    }

    /// Fetch one page of activity via the source.
    ///
    /// Returns `(recent, full)` where `recent` is truncated to the memory
    /// limit. A fetch failure returns two empty lists and bumps the error
    /// counter without touching the windows. The caller must treat it as
    /// "no change this tick", never as an emptied feed.
    pub async fn retrieve(
        &mut self,
        source: &(dyn ActivitySource + Send + Sync),
    ) -> (Vec<Activity>, Vec<Activity>) {
        match source
            .fetch_activity(
                &self.subscription.identity,
                self.subscription.kind,
                self.memory_limit,
            )
            .await
        {
            Ok(full) => {
                self.consecutive_errors = 0;
                let recent = full.iter().take(self.memory_limit).cloned().collect();
                (recent, full)
            }
            Err(e) => {
                self.consecutive_errors += 1;
                tracing::warn!(
                    "fetch failed for {} (attempt {}): {}",
                    self.subscription.label(),
                    self.consecutive_errors,
                    e
                );
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Reconcile a fetched page against the windows.
    ///
    /// The first non-empty result seeds `processed` wholesale and produces
    /// no notifications. Afterwards, each item in API order (newest first)
    /// is queued at the front of `pending` unless one of the skip rules
    /// rejects it.
    pub fn update(&mut self, items: &[Activity]) {
        if !self.initialized {
            if items.is_empty() {
                tracing::debug!("could not seed {}", self.subscription.label());
                return;
            }

            self.processed = items.iter().take(self.memory_limit).cloned().collect();
            self.initialized = true;
            tracing::info!(
                "seeded {} with {} entries",
                self.subscription.label(),
                self.processed.len()
            );
            return;
        }

        for item in items {
            if self.processed.iter().any(|p| p.id == item.id) {
                continue;
            }

            if self.subscription.kind.is_list() {
                // One progress update per media in flight at a time.
                if self.pending.iter().any(|p| p.same_media(item)) {
                    continue;
                }
                // Stale duplicate: an already-announced entry for this media
                // is at least as recent.
                if self
                    .processed
                    .iter()
                    .filter(|p| p.same_media(item))
                    .any(|p| item.created_at <= p.created_at)
                {
                    continue;
                }
                // Older than the retention horizon; don't resurrect items
                // that already fell out of the window.
                if let Some(oldest) = self.processed.iter().map(|p| p.created_at).min() {
                    if item.created_at < oldest {
                        continue;
                    }
                }
            }

            tracing::debug!("queued activity {} for {}", item.id, self.subscription.label());
            self.pending.insert(0, item.clone());
        }

        self.pending.truncate(self.memory_limit);
    }

    /// Deliver one pending item and move it to `processed`.
    ///
    /// Delivery failures are logged and the item is still marked processed:
    /// at-most-once beats re-announcing a permanently failing item every
    /// tick. A [`Delivery::Replace`] outcome splices the replacement over
    /// the matching-media pending member before the move.
    ///
    /// Returns false only if the item was already processed.
    pub async fn move_item(
        &mut self,
        item: &Activity,
        sink: &(dyn ItemSink + Send + Sync),
    ) -> bool {
        if self.processed.iter().any(|p| p.id == item.id) {
            return false;
        }

        let mut moved = item.clone();

        match sink.deliver(item).await {
            Ok(Delivery::Sent) => {}
            Ok(Delivery::Replace(replacement)) => {
                if let Some(pos) = self.pending.iter().position(|p| p.same_media(&replacement)) {
                    self.pending[pos] = replacement.clone();
                }
                moved = replacement;
            }
            Err(e) => {
                tracing::warn!(
                    "delivery failed for {} to {}: {} (marking processed)",
                    item.id,
                    self.subscription.destination,
                    e
                );
            }
        }

        if !self.processed.iter().any(|p| p.id == moved.id) {
            self.processed.insert(0, moved.clone());
            self.processed.truncate(self.memory_limit);
        }

        self.pending.retain(|p| p.id != item.id && p.id != moved.id);

        true
    }

    /// Drain a snapshot of `pending` through the sink. Returns how many
    /// items were moved.
    pub async fn process_entries(&mut self, sink: &(dyn ItemSink + Send + Sync)) -> usize {
        let snapshot = self.pending.clone();
        let mut moved = 0;

        for item in snapshot {
            if self.move_item(&item, sink).await {
                moved += 1;
            }
        }

        if moved > 0 {
            tracing::debug!(
                "{}: announced {} item(s), {} processed / {} pending retained",
                self.subscription.label(),
                moved,
                self.processed.len(),
                self.pending.len()
            );
        }

        moved
    }
}
