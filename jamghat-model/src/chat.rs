use crate::error::ModelError;
use crate::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest chat message accepted by the server.
pub const MAX_CHAT_MESSAGE_LEN: usize = 500;

/// A single party chat message.
///
/// Immutable once created; ordered by `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: UserId,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Validate and normalize a raw chat message body.
pub fn normalize_message(raw: &str) -> Result<String, ModelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ModelError::InvalidChatMessage(
            "message is empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_CHAT_MESSAGE_LEN {
        return Err(ModelError::InvalidChatMessage(format!(
            "message exceeds {MAX_CHAT_MESSAGE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}
