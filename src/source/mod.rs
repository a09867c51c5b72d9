pub mod anilist;

pub use anilist::AniListSource;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Activity, ActivityKind};

/// External collaborator that fetches a page of activity for a tracked
/// identity.
///
/// Implementations return items most-recent-first, sized to one page of
/// `limit` entries. Pagination beyond one page belongs to the implementation,
/// not to the reconciliation engine.
#[async_trait]
pub trait ActivitySource {
    async fn fetch_activity(
        &self,
        identity: &str,
        kind: ActivityKind,
        limit: usize,
    ) -> Result<Vec<Activity>>;

    /// Whether the identity resolves to an existing account upstream.
    async fn verify_identity(&self, identity: &str) -> Result<bool>;
}
