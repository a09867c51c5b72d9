use serde::{Deserialize, Serialize};

use crate::domain::StatusCategory;

/// Per-destination suppression flags for list-activity statuses.
///
/// Shared by every subscription posting to the destination. Completion
/// announcements are never suppressible. The default (all flags off)
/// filters nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFilter {
    pub hide_in_progress: bool,
    pub hide_planning: bool,
    pub hide_dropped: bool,
    pub hide_paused: bool,
}

impl ChannelFilter {
    pub fn suppresses(&self, category: StatusCategory) -> bool {
        match category {
            StatusCategory::InProgress => self.hide_in_progress,
            StatusCategory::Planning => self.hide_planning,
            StatusCategory::Dropped => self.hide_dropped,
            StatusCategory::Paused => self.hide_paused,
            StatusCategory::Completed => false,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_nothing() {
        let filter = ChannelFilter::default();
        for category in [
            StatusCategory::InProgress,
            StatusCategory::Planning,
            StatusCategory::Completed,
            StatusCategory::Dropped,
            StatusCategory::Paused,
        ] {
            assert!(!filter.suppresses(category));
        }
    }

    #[test]
    fn test_flags_map_to_categories() {
        let filter = ChannelFilter {
            hide_in_progress: true,
            hide_planning: false,
            hide_dropped: true,
            hide_paused: false,
        };
        assert!(filter.suppresses(StatusCategory::InProgress));
        assert!(!filter.suppresses(StatusCategory::Planning));
        assert!(filter.suppresses(StatusCategory::Dropped));
        assert!(!filter.suppresses(StatusCategory::Paused));
    }

    #[test]
    fn test_completed_never_suppressed() {
        let filter = ChannelFilter {
            hide_in_progress: true,
            hide_planning: true,
            hide_dropped: true,
            hide_paused: true,
        };
        assert!(!filter.suppresses(StatusCategory::Completed));
    }
}
