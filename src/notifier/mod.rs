pub mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Activity;

/// Outcome of delivering one activity.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// The item went out (or was deliberately dropped) and should be marked
    /// processed as-is.
    Sent,
    /// The delivered item supersedes a still-pending announcement for the
    /// same media; the carried replacement is spliced over that pending
    /// member and marked processed in the original's place.
    Replace(Activity),
}

/// External collaborator that renders and sends one activity to a
/// destination.
#[async_trait]
pub trait Notifier {
    async fn notify(&self, item: &Activity, destination: &str) -> Result<Delivery>;

    /// Whether the destination still resolves and accepts messages. Checked
    /// at load and add time; failures there drop the subscription.
    async fn destination_ok(&self, destination: &str) -> bool;
}
