//! Request and response bodies for the party sync HTTP API.

use crate::chat::ChatMessage;
use crate::ids::{ContentId, EpisodeId};
use crate::party::{ContentKind, PlaybackSnapshot, WatchParty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /api/party`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    pub content_id: ContentId,
    #[serde(rename = "contentType")]
    pub content_kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<EpisodeId>,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
}

/// `POST /api/party/{id}/join`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyRequest {
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
}

/// `POST /api/party/{id}/sync`: host-only playback push.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub current_time: f64,
    pub is_playing: bool,
}

/// Acknowledgment for a sync push, echoing the stored snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub playback: PlaybackSnapshot,
}

/// `GET /api/party/{id}/state`: full snapshot plus a cursor echo.
///
/// `server_time` is the value clients pass back as `since` on their next
/// poll. The party payload is always the complete snapshot; the cursor
/// exists for the chat endpoint and for ordering, not for deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    #[serde(flatten)]
    pub party: WatchParty,
    pub server_time: DateTime<Utc>,
}

/// `POST /api/party/{id}/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostChatRequest {
    pub message: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
}

/// `GET /api/party/{id}/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
    pub server_time: DateTime<Utc>,
}

/// Query parameters shared by the state and chat polls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SinceQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}
