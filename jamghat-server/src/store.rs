//! In-memory watch party store.
//!
//! Parties live in process memory and reset on server restart. A party is
//! kept alive by activity (joins, sync pushes, chat, state polls); once
//! idle past the configured TTL it reads as absent and is removed. Members
//! that stop polling are pruned after a staleness window, so a departed
//! client and a crashed one converge to the same outcome.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use jamghat_model::api::{CreatePartyRequest, SyncRequest};
use jamghat_model::chat::normalize_message;
use jamghat_model::{
    ChatMessage, ContentKind, PartyId, PartyMember, PlaybackSnapshot,
    UserId, WatchParty,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Tunables for party lifecycle policy.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Inactivity window after which a party expires.
    pub party_ttl: Duration,
    /// Staleness window after which a silent member is pruned.
    pub member_timeout: Duration,
    /// Number of chat messages retained per party.
    pub chat_keep: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            party_ttl: Duration::hours(2),
            member_timeout: Duration::seconds(30),
            chat_keep: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("watch party not found or expired")]
    PartyNotFound,

    #[error("only the host can update playback")]
    NotHost,

    #[error("not a member of this watch party")]
    NotMember,

    #[error("{0}")]
    InvalidMessage(String),
}

#[derive(Debug)]
struct PartyEntry {
    id: PartyId,
    content_id: jamghat_model::ContentId,
    content_kind: ContentKind,
    episode_id: Option<jamghat_model::EpisodeId>,
    host_id: UserId,
    /// Join order; host promotion picks the oldest remaining member.
    members: Vec<PartyMember>,
    playback: PlaybackSnapshot,
    chat: Vec<ChatMessage>,
    chat_total: u64,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl PartyEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity_at > ttl
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    fn member_mut(&mut self, user_id: &UserId) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| &m.user_id == user_id)
    }

    /// Hand the party to the oldest remaining member.
    ///
    /// Callers must have verified the member list is non-empty.
    fn promote_new_host(&mut self) {
        if let Some(next) = self.members.first_mut() {
            next.is_host = true;
            self.host_id = next.user_id;
            info!(party = %self.id, new_host = %self.host_id, "promoted new host");
        }
    }

    fn host_is_present(&self) -> bool {
        self.members.iter().any(|m| m.user_id == self.host_id)
    }

    fn snapshot(&self) -> WatchParty {
        WatchParty {
            id: self.id.clone(),
            content_id: self.content_id,
            content_kind: self.content_kind,
            episode_id: self.episode_id,
            host_id: self.host_id,
            members: self.members.clone(),
            playback: self.playback,
            chat_count: self.chat_total,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Concurrent map of live parties.
#[derive(Debug, Default)]
pub struct PartyStore {
    parties: DashMap<PartyId, PartyEntry>,
    config: StoreConfig,
}

impl PartyStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            parties: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live parties (expired entries may still be counted until
    /// the next sweep or read).
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    /// Create a party with the caller as host and first member.
    pub fn create(
        &self,
        host_id: UserId,
        req: &CreatePartyRequest,
    ) -> WatchParty {
        let now = Utc::now();
        let host = PartyMember {
            id: host_id,
            user_id: host_id,
            name: req.user_name.clone(),
            avatar: req.user_avatar.clone(),
            is_host: true,
            last_seen_at: now,
        };

        loop {
            let id = PartyId::generate();
            match self.parties.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let entry = slot.insert(PartyEntry {
                        id: id.clone(),
                        content_id: req.content_id,
                        content_kind: req.content_kind,
                        episode_id: req.episode_id,
                        host_id,
                        members: vec![host],
                        playback: PlaybackSnapshot::initial(now),
                        chat: Vec::new(),
                        chat_total: 0,
                        created_at: now,
                        last_activity_at: now,
                    });
                    let snapshot = entry.snapshot();
                    drop(entry);
                    info!(party = %id, host = %host_id, "created watch party");
                    self.sweep();
                    return snapshot;
                }
            }
        }
    }

    /// Add a member, or refresh them if already present.
    pub fn join(
        &self,
        id: &PartyId,
        user_id: UserId,
        user_name: &str,
        user_avatar: Option<&str>,
    ) -> Result<WatchParty, StoreError> {
        let now = Utc::now();
        let mut entry = self.live_entry(id, now)?;

        if let Some(member) = entry.member_mut(&user_id) {
            member.last_seen_at = now;
        } else {
            entry.members.push(PartyMember {
                id: user_id,
                user_id,
                name: user_name.to_string(),
                avatar: user_avatar.map(str::to_string),
                is_host: false,
                last_seen_at: now,
            });
            info!(party = %id, user = %user_id, "member joined");
        }
        entry.touch(now);
        Ok(entry.snapshot())
    }

    /// Full state snapshot for a polling member.
    ///
    /// Refreshes the caller's `last_seen_at` so steady polling keeps them
    /// present.
    pub fn poll_state(
        &self,
        id: &PartyId,
        user_id: &UserId,
    ) -> Result<WatchParty, StoreError> {
        let now = Utc::now();
        let mut entry = self.live_entry(id, now)?;

        if let Some(member) = entry.member_mut(user_id) {
            member.last_seen_at = now;
            entry.touch(now);
        }
        Ok(entry.snapshot())
    }

    /// Replace the authoritative playback snapshot. Host only.
    pub fn sync(
        &self,
        id: &PartyId,
        user_id: &UserId,
        req: SyncRequest,
    ) -> Result<PlaybackSnapshot, StoreError> {
        let now = Utc::now();
        let mut entry = self.live_entry(id, now)?;

        if &entry.host_id != user_id {
            return Err(StoreError::NotHost);
        }

        entry.playback = PlaybackSnapshot {
            current_time: req.current_time,
            is_playing: req.is_playing,
            updated_at: now,
        };
        if let Some(host) = entry.member_mut(user_id) {
            host.last_seen_at = now;
        }
        entry.touch(now);
        Ok(entry.playback)
    }

    /// Append a chat message. Members only; the body is trimmed and
    /// length-checked.
    pub fn post_chat(
        &self,
        id: &PartyId,
        user_id: &UserId,
        user_name: &str,
        user_avatar: Option<&str>,
        raw_message: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = normalize_message(raw_message)
            .map_err(|e| StoreError::InvalidMessage(e.to_string()))?;

        let now = Utc::now();
        let mut entry = self.live_entry(id, now)?;

        if entry.member_mut(user_id).is_none() {
            return Err(StoreError::NotMember);
        }

        let chat_message = ChatMessage {
            id: Uuid::new_v4(),
            user_id: *user_id,
            user_name: user_name.to_string(),
            user_avatar: user_avatar.map(str::to_string),
            message,
            created_at: now,
        };

        entry.chat.push(chat_message.clone());
        entry.chat_total += 1;
        let keep = self.config.chat_keep;
        if entry.chat.len() > keep {
            let drop = entry.chat.len() - keep;
            entry.chat.drain(..drop);
        }

        if let Some(member) = entry.member_mut(user_id) {
            member.last_seen_at = now;
        }
        entry.touch(now);
        Ok(chat_message)
    }

    /// Retained messages newer than `since`, oldest first.
    pub fn chat_since(
        &self,
        id: &PartyId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let now = Utc::now();
        let entry = self.live_entry(id, now)?;

        let messages = match since {
            None => entry.chat.clone(),
            Some(since) => entry
                .chat
                .iter()
                .filter(|m| m.created_at > since)
                .cloned()
                .collect(),
        };
        Ok(messages)
    }

    /// Remove a member. Returns `true` when the party was deleted as a
    /// result. Absent parties are fine; leave is best-effort.
    pub fn leave(&self, id: &PartyId, user_id: &UserId) -> bool {
        let now = Utc::now();
        let Ok(mut entry) = self.live_entry(id, now) else {
            return false;
        };

        entry.members.retain(|m| &m.user_id != user_id);
        entry.touch(now);

        if entry.members.is_empty() {
            drop(entry);
            self.parties.remove(id);
            info!(party = %id, "deleted empty watch party");
            return true;
        }

        if !entry.host_is_present() {
            entry.promote_new_host();
        }
        false
    }

    /// Prune expired parties and stale members.
    ///
    /// Also runs opportunistically on create; a dedicated background task
    /// keeps idle parties from lingering between creations.
    pub fn sweep(&self) {
        let now = Utc::now();
        let ttl = self.config.party_ttl;
        let timeout = self.config.member_timeout;

        self.parties.retain(|id, entry| {
            if entry.is_expired(now, ttl) {
                debug!(party = %id, "sweeping expired party");
                return false;
            }

            let before = entry.members.len();
            entry
                .members
                .retain(|m| now - m.last_seen_at <= timeout);
            if entry.members.len() != before {
                debug!(
                    party = %id,
                    pruned = before - entry.members.len(),
                    "pruned stale members"
                );
            }

            if entry.members.is_empty() {
                debug!(party = %id, "sweeping empty party");
                return false;
            }

            if !entry.host_is_present() {
                entry.promote_new_host();
            }
            true
        });
    }

    fn live_entry(
        &self,
        id: &PartyId,
        now: DateTime<Utc>,
    ) -> Result<RefMut<'_, PartyId, PartyEntry>, StoreError> {
        let ttl = self.config.party_ttl;
        match self.parties.get_mut(id) {
            None => return Err(StoreError::PartyNotFound),
            Some(entry) if !entry.is_expired(now, ttl) => return Ok(entry),
            Some(_) => {}
        }
        // Expired: the read guard is released, drop the entry for real.
        self.parties.remove(id);
        Err(StoreError::PartyNotFound)
    }
}
