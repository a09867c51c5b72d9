pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::app::Result;
use crate::domain::{ChannelFilter, Subscription};

/// Per-record result of a bulk removal.
///
/// `Ok(true)` means the record was deleted, `Ok(false)` that it wasn't
/// there, `Err` that the store itself failed for this record. Distinguishing
/// the three matters: destinations vanish concurrently and a not-found
/// removal is routine, while a transport failure deserves a log line.
#[derive(Debug)]
pub struct RemoveOutcome {
    pub subscription: Subscription,
    pub result: Result<bool>,
}

/// Durable subscription records plus per-destination channel filters.
///
/// Callers serialize their own access; there is no transactional guarantee
/// across a batch.
pub trait SubscriptionStore {
    fn list(&self) -> Result<Vec<Subscription>>;

    /// Insert records, skipping any that already exist.
    fn insert(&self, records: &[Subscription]) -> Result<()>;

    /// Remove records one by one. A failing record never aborts the batch;
    /// each outcome is reported separately.
    fn remove(&self, records: &[Subscription]) -> Vec<RemoveOutcome>;

    /// The destination's filter, or the all-permissive default when none is
    /// stored.
    fn get_filter(&self, destination: &str) -> Result<ChannelFilter>;

    fn set_filter(&self, destination: &str, filter: &ChannelFilter) -> Result<()>;
}
