//! Watch party state shared between the sync server and clients.

use crate::ids::{ContentId, EpisodeId, PartyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of catalog content a party is watching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

/// A user present in a watch party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMember {
    pub id: UserId,
    pub user_id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_host: bool,
    pub last_seen_at: DateTime<Utc>,
}

/// The single authoritative playback snapshot for a party.
///
/// Last-writer-wins; the writer is always the host. `updated_at` only moves
/// forward, and consumers must never apply a snapshot older than the last
/// one they applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// Playback position in seconds.
    pub current_time: f64,
    pub is_playing: bool,
    pub updated_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    /// Snapshot for a freshly created party: paused at the start.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            current_time: 0.0,
            is_playing: false,
            updated_at: now,
        }
    }

    /// Whether `other` supersedes this snapshot.
    pub fn is_superseded_by(&self, other: &PlaybackSnapshot) -> bool {
        other.updated_at > self.updated_at
    }
}

/// A synchronized viewing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchParty {
    pub id: PartyId,
    pub content_id: ContentId,
    #[serde(rename = "contentType")]
    pub content_kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<EpisodeId>,
    pub host_id: UserId,
    pub members: Vec<PartyMember>,
    pub playback: PlaybackSnapshot,
    /// Monotonic total of chat messages ever posted. Informational only;
    /// the retained chat log may be shorter.
    pub chat_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl WatchParty {
    pub fn is_hosted_by(&self, user_id: &UserId) -> bool {
        &self.host_id == user_id
    }

    pub fn member(&self, user_id: &UserId) -> Option<&PartyMember> {
        self.members.iter().find(|m| &m.user_id == user_id)
    }

    /// Member ids, for join/leave diffing between consecutive snapshots.
    pub fn member_ids(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().map(|m| &m.id)
    }
}
