use serde::{Deserialize, Serialize};

use crate::domain::ActivityKind;

/// A tracked (identity, destination, content-kind) triple.
///
/// At most one subscription may exist per triple; the store enforces this
/// and [`SubscriptionManager`](crate::manager::SubscriptionManager) rejects
/// duplicates before they reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    /// The tracked account name.
    pub identity: String,
    /// Opaque channel identifier (a webhook URL in the default setup).
    pub destination: String,
    #[serde(rename = "contentKind")]
    pub kind: ActivityKind,
}

impl Subscription {
    pub fn new(
        identity: impl Into<String>,
        destination: impl Into<String>,
        kind: ActivityKind,
    ) -> Self {
        Self {
            identity: identity.into(),
            destination: destination.into(),
            kind,
        }
    }

    /// Compact label for log lines.
    pub fn label(&self) -> String {
        format!("{}:{}:{}", self.identity, self.kind, self.destination)
    }
}
