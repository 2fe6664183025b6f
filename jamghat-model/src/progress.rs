//! Watch progress types backing resume-from-history.
//!
//! Progress is tracked as a percentage of duration. Items at or past the
//! resume ceiling restart from the beginning when reopened; `completed` is
//! only set by an explicit end-of-media event, never inferred from the
//! percentage.

use crate::ids::{ContentId, EpisodeId, ProfileId, UserId};
use serde::{Deserialize, Serialize};

/// Progress at or beyond this percentage restarts playback from zero.
pub const RESUME_CEILING_PERCENT: f64 = 90.0;

/// What a history entry is keyed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum WatchTarget {
    Episode {
        series_id: ContentId,
        episode_id: EpisodeId,
    },
    Movie {
        content_id: ContentId,
    },
}

/// Identity + content pair a progress record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressKey {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
    #[serde(flatten)]
    pub target: WatchTarget,
}

/// Persisted watch-history record for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    /// Percentage of duration watched, clamped to `[0, 100]`.
    pub progress: f64,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Media duration in seconds; 0 when unknown.
    pub duration: f64,
    pub completed: bool,
}

impl WatchHistoryEntry {
    /// Fresh record for content that was just opened.
    pub fn started() -> Self {
        Self {
            progress: 0.0,
            current_time: 0.0,
            duration: 0.0,
            completed: false,
        }
    }

    /// Record for a position update during playback.
    pub fn at_position(current_time: f64, duration: f64) -> Self {
        Self {
            progress: ProgressPercent::of(current_time, duration).get(),
            current_time,
            duration,
            completed: false,
        }
    }

    /// Record for an explicit end-of-media event.
    pub fn finished(duration: f64) -> Self {
        Self {
            progress: 100.0,
            current_time: duration,
            duration,
            completed: true,
        }
    }
}

/// Watch progress percentage, clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ProgressPercent(f64);

impl ProgressPercent {
    pub fn new(percent: f64) -> Self {
        if percent.is_nan() {
            return ProgressPercent(0.0);
        }
        ProgressPercent(percent.clamp(0.0, 100.0))
    }

    /// Percentage of `duration` that `position` represents.
    pub fn of(position: f64, duration: f64) -> Self {
        if duration <= 0.0 {
            return ProgressPercent(0.0);
        }
        Self::new(position / duration * 100.0)
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Past the point where reopening restarts from the beginning.
    pub fn is_effectively_finished(&self) -> bool {
        self.0 >= RESUME_CEILING_PERCENT
    }
}
