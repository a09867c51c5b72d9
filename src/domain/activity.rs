use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of activity a subscription tracks.
///
/// `Anime` and `Manga` are list activities (progress updates against a media
/// entry); `Text` covers status posts and messages on the user's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Anime,
    Manga,
    Text,
}

impl ActivityKind {
    /// List activities carry a media id and a progress status; text posts
    /// don't.
    pub fn is_list(self) -> bool {
        matches!(self, ActivityKind::Anime | ActivityKind::Manga)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Anime => "anime",
            ActivityKind::Manga => "manga",
            ActivityKind::Text => "text",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anime" => Ok(ActivityKind::Anime),
            "manga" => Ok(ActivityKind::Manga),
            "text" => Ok(ActivityKind::Text),
            other => Err(format!(
                "unknown activity kind: {} (expected anime, manga or text)",
                other
            )),
        }
    }
}

/// Coarse category of a list-activity status, used by channel filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    InProgress,
    Planning,
    Completed,
    Dropped,
    Paused,
}

impl StatusCategory {
    /// Map an AniList status string ("watched episode", "plans to read", ...)
    /// to its category. Unknown statuses map to `None` and are never
    /// filtered.
    pub fn from_status(status: &str) -> Option<Self> {
        let s = status.to_ascii_lowercase();
        if s.starts_with("watched episode")
            || s.starts_with("read chapter")
            || s.starts_with("rewatched episode")
            || s.starts_with("reread chapter")
        {
            Some(StatusCategory::InProgress)
        } else if s.starts_with("plans to") {
            Some(StatusCategory::Planning)
        } else if s.starts_with("completed") {
            Some(StatusCategory::Completed)
        } else if s.starts_with("dropped") {
            Some(StatusCategory::Dropped)
        } else if s.starts_with("paused") {
            Some(StatusCategory::Paused)
        } else {
            None
        }
    }
}

/// A single fetched activity unit.
///
/// Activities are immutable once fetched and are compared by `id` (and
/// `media_id` for list kinds) only, never by deep equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    /// Set for list activities, `None` for text posts.
    pub media_id: Option<i64>,
    /// The tracked account this activity belongs to.
    pub identity: String,
    pub kind: ActivityKind,
    pub created_at: DateTime<Utc>,
    /// Status string as reported upstream, e.g. "watched episode".
    pub status: Option<String>,
    /// Progress payload, e.g. "5" or "3 - 5".
    pub progress: Option<String>,
    pub media_title: Option<String>,
    pub media_url: Option<String>,
    /// Body of a text post or message.
    pub text: Option<String>,
}

impl Activity {
    /// Whether two activities refer to the same media entry. Text posts
    /// never match.
    pub fn same_media(&self, other: &Activity) -> bool {
        matches!((self.media_id, other.media_id), (Some(a), Some(b)) if a == b)
    }

    pub fn status_category(&self) -> Option<StatusCategory> {
        self.status.as_deref().and_then(StatusCategory::from_status)
    }

    pub fn display_title(&self) -> &str {
        self.media_title.as_deref().unwrap_or("(untitled)")
    }
}
