//! Core data model definitions shared across jamghat crates.
#![allow(missing_docs)]

pub mod api;
pub mod chat;
pub mod error;
pub mod ids;
pub mod party;
pub mod progress;

// Intentionally curated re-exports for downstream consumers.
pub use api::{
    ChatHistoryResponse, CreatePartyRequest, JoinPartyRequest,
    PostChatRequest, StateResponse, SyncRequest, SyncResponse,
};
pub use chat::ChatMessage;
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ContentId, EpisodeId, PartyId, ProfileId, UserId};
pub use party::{ContentKind, PartyMember, PlaybackSnapshot, WatchParty};
pub use progress::{
    ProgressKey, ProgressPercent, RESUME_CEILING_PERCENT,
    WatchHistoryEntry, WatchTarget,
};
