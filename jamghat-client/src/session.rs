//! Watch party session manager.
//!
//! Owns zero-or-one live party on the client and keeps it converged with
//! the server over two independent polling loops: party state every
//! 1.5 s, chat every 2 s. The loops are deliberately decoupled so a slow
//! chat fetch never delays playback correction and vice versa.
//!
//! Consistency model: last-writer-wins on the host's clock. Members never
//! push playback state; they pull the authoritative snapshot and correct
//! their local player. Small divergence (at or under the drift tolerance)
//! is left alone to avoid micro-seek stutter from ordinary poll jitter; a
//! larger delta is treated as a hard seek.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use jamghat_model::api::{
    CreatePartyRequest, JoinPartyRequest, PostChatRequest, StateResponse,
    SyncRequest,
};
use jamghat_model::{
    ChatMessage, ContentId, ContentKind, EpisodeId, PartyId, PartyMember,
    UserId, WatchParty,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::api_client::{ClientError, PartyApi};
use crate::events::PartyObserver;

/// Who this client is, as shown to other party members.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub user_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

/// Session cadence and tolerance knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Party state poll period.
    pub state_poll_interval: Duration,
    /// Chat poll period, independent of the state loop.
    pub chat_poll_interval: Duration,
    /// Minimum spacing between host sync pushes; extra calls inside the
    /// window are dropped, not queued.
    pub sync_throttle: Duration,
    /// Position delta (seconds) beyond which a host snapshot is a hard
    /// seek rather than jitter.
    pub drift_tolerance: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_poll_interval: Duration::from_millis(1500),
            chat_poll_interval: Duration::from_millis(2000),
            sync_throttle: Duration::from_secs(1),
            drift_tolerance: 1.0,
        }
    }
}

/// What a state poll asked the player shell to do.
#[derive(Debug, Clone, PartialEq)]
enum SessionEvent {
    Synced { current_time: f64, is_playing: bool },
    Played,
    Paused,
    MemberJoined(PartyMember),
    MemberLeft(UserId),
}

/// Mutable session state, serialized behind one lock.
///
/// Polling tasks and public methods all go through this; nothing here is
/// touched without holding the mutex.
#[derive(Debug, Default)]
struct SessionState {
    party: Option<WatchParty>,
    is_host: bool,
    state_cursor: Option<chrono::DateTime<chrono::Utc>>,
    chat_cursor: Option<chrono::DateTime<chrono::Utc>>,
    /// Last authoritative position this member applied; the comparison
    /// base for drift detection. Starts at 0 so a first snapshot beyond
    /// tolerance seeks.
    last_known_time: f64,
    /// `updated_at` of the last applied snapshot. Guards against a slow
    /// poll response landing after a newer one was already applied.
    last_applied_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Wall-clock instant of the last transmitted sync push.
    last_sync_sent: Option<Instant>,
}

impl SessionState {
    fn clear(&mut self) {
        *self = SessionState::default();
    }

    /// Fold a state poll response in and report what the shell must do.
    ///
    /// Pure with respect to I/O; callers fire the returned events after
    /// releasing the lock.
    fn apply_state_response(
        &mut self,
        response: StateResponse,
        own_user_id: &UserId,
        drift_tolerance: f64,
    ) -> Vec<SessionEvent> {
        let Some(previous) = self.party.take() else {
            // Torn down while the poll was in flight; drop the response.
            return Vec::new();
        };

        let party = response.party;
        self.state_cursor = Some(response.server_time);
        // Host could have been handed off; the polled value is ground
        // truth every tick.
        self.is_host = party.is_hosted_by(own_user_id);

        let mut events = Vec::new();

        let previous_ids: HashSet<UserId> =
            previous.member_ids().copied().collect();
        let new_ids: HashSet<UserId> =
            party.member_ids().copied().collect();
        for member in &party.members {
            if !previous_ids.contains(&member.id) {
                events.push(SessionEvent::MemberJoined(member.clone()));
            }
        }
        for id in &previous_ids {
            if !new_ids.contains(id) {
                events.push(SessionEvent::MemberLeft(*id));
            }
        }

        if !self.is_host {
            let snapshot = party.playback;
            let newer = self
                .last_applied_at
                .is_none_or(|applied| snapshot.updated_at > applied);
            if newer {
                let delta =
                    (snapshot.current_time - self.last_known_time).abs();
                if delta > drift_tolerance {
                    events.push(SessionEvent::Synced {
                        current_time: snapshot.current_time,
                        is_playing: snapshot.is_playing,
                    });
                    self.last_known_time = snapshot.current_time;
                } else if snapshot.is_playing != previous.playback.is_playing
                {
                    events.push(if snapshot.is_playing {
                        SessionEvent::Played
                    } else {
                        SessionEvent::Paused
                    });
                }
                self.last_applied_at = Some(snapshot.updated_at);
            }
        }

        self.party = Some(party);
        events
    }
}

struct SessionShared {
    api: PartyApi,
    identity: ClientIdentity,
    observer: Arc<dyn PartyObserver>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionShared")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Client-side handle on at most one live watch party.
#[derive(Debug, Clone)]
pub struct PartySession {
    shared: Arc<SessionShared>,
}

impl PartySession {
    /// Build a session against `base_url`, delivering events to
    /// `observer`. Nothing happens until a party is created or joined.
    pub fn new(
        base_url: Url,
        identity: ClientIdentity,
        observer: Arc<dyn PartyObserver>,
        config: SessionConfig,
    ) -> Self {
        let api = PartyApi::new(base_url, identity.user_id);
        Self {
            shared: Arc::new(SessionShared {
                api,
                identity,
                observer,
                config,
                state: Mutex::new(SessionState::default()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn current_party(&self) -> Option<WatchParty> {
        self.shared.state.lock().expect("session lock").party.clone()
    }

    pub fn is_host(&self) -> bool {
        self.shared.state.lock().expect("session lock").is_host
    }

    /// Create a party for the given content and start polling.
    ///
    /// An already-active party is left (best-effort) first; a session
    /// never tracks two parties.
    pub async fn create_party(
        &self,
        content_id: ContentId,
        content_kind: ContentKind,
        episode_id: Option<EpisodeId>,
    ) -> Result<WatchParty, ClientError> {
        self.leave_if_active().await;

        let request = CreatePartyRequest {
            content_id,
            content_kind,
            episode_id,
            user_name: self.shared.identity.name.clone(),
            user_avatar: self.shared.identity.avatar.clone(),
        };
        let party = self.shared.api.create_party(&request).await?;
        self.adopt_party(party.clone());
        Ok(party)
    }

    /// Join an existing party by its code and start polling.
    pub async fn join_party(
        &self,
        party_id: &PartyId,
    ) -> Result<WatchParty, ClientError> {
        self.leave_if_active().await;

        let request = JoinPartyRequest {
            user_name: self.shared.identity.name.clone(),
            user_avatar: self.shared.identity.avatar.clone(),
        };
        let party = self.shared.api.join_party(party_id, &request).await?;
        self.adopt_party(party.clone());
        Ok(party)
    }

    /// Push the host's playback snapshot.
    ///
    /// No-op for non-hosts and for calls inside the throttle window;
    /// transport failures are logged and absorbed; the next push or poll
    /// reconverges naturally.
    pub async fn send_sync(&self, current_time: f64, is_playing: bool) {
        let party_id = {
            let mut state = self.shared.state.lock().expect("session lock");
            if !state.is_host {
                return;
            }
            let Some(party) = &state.party else {
                return;
            };
            let now = Instant::now();
            if let Some(last) = state.last_sync_sent
                && now.duration_since(last) < self.shared.config.sync_throttle
            {
                debug!("sync push dropped by throttle");
                return;
            }
            let party_id = party.id.clone();
            state.last_sync_sent = Some(now);
            party_id
        };

        let request = SyncRequest {
            current_time,
            is_playing,
        };
        if let Err(err) = self.shared.api.sync(&party_id, request).await {
            warn!(party = %party_id, "sync push failed: {err}");
        }
    }

    /// Post a chat message to the active party.
    pub async fn send_chat(
        &self,
        message: &str,
    ) -> Result<ChatMessage, ClientError> {
        let party_id = {
            let state = self.shared.state.lock().expect("session lock");
            state
                .party
                .as_ref()
                .map(|p| p.id.clone())
                .ok_or(ClientError::NoActiveParty)?
        };

        let request = PostChatRequest {
            message: message.to_string(),
            user_name: self.shared.identity.name.clone(),
            user_avatar: self.shared.identity.avatar.clone(),
        };
        self.shared.api.post_chat(&party_id, &request).await
    }

    /// Leave the active party.
    ///
    /// Both polling loops stop and local state is cleared before the
    /// server is notified; a failed leave request never blocks local
    /// cleanup.
    pub async fn leave_party(&self) {
        if let Some(party_id) = Self::teardown_local(&self.shared)
            && let Err(err) = self.shared.api.leave(&party_id).await
        {
            debug!(party = %party_id, "leave notification failed: {err}");
        }
    }

    async fn leave_if_active(&self) {
        let active = {
            self.shared
                .state
                .lock()
                .expect("session lock")
                .party
                .is_some()
        };
        if active {
            self.leave_party().await;
        }
    }

    fn adopt_party(&self, party: WatchParty) {
        let is_host = party.is_hosted_by(&self.shared.identity.user_id);
        {
            let mut state = self.shared.state.lock().expect("session lock");
            state.clear();
            state.is_host = is_host;
            // Comparison base for drift: a member starts at position 0,
            // so the first divergent snapshot hard-seeks.
            state.last_known_time = 0.0;
            state.party = Some(party);
        }
        self.start_polling();
    }

    fn start_polling(&self) {
        let mut tasks = self.shared.tasks.lock().expect("tasks lock");
        for task in tasks.drain(..) {
            task.abort();
        }

        // Tasks hold the session weakly so an abandoned session winds
        // down on its own instead of keeping itself alive.
        let weak = Arc::downgrade(&self.shared);
        let interval = self.shared.config.state_poll_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            // Polls are sequenced: each response is awaited before the
            // next tick fires, so responses apply in issue order. The
            // `updated_at` guard in apply covers the server side.
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !Self::poll_state_once(&shared).await {
                    break;
                }
            }
        }));

        let weak = Arc::downgrade(&self.shared);
        let interval = self.shared.config.chat_poll_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !Self::poll_chat_once(&shared).await {
                    break;
                }
            }
        }));
    }

    /// One state poll. Returns `false` when the loop should stop.
    async fn poll_state_once(shared: &Arc<SessionShared>) -> bool {
        let (party_id, cursor) = {
            let state = shared.state.lock().expect("session lock");
            match &state.party {
                Some(party) => (party.id.clone(), state.state_cursor),
                None => return false,
            }
        };

        match shared.api.party_state(&party_id, cursor).await {
            Ok(response) => {
                let events = {
                    let mut state =
                        shared.state.lock().expect("session lock");
                    state.apply_state_response(
                        response,
                        &shared.identity.user_id,
                        shared.config.drift_tolerance,
                    )
                };
                for event in events {
                    dispatch(&*shared.observer, &event);
                }
                true
            }
            Err(ClientError::PartyGone) => {
                debug!(party = %party_id, "party expired; tearing down");
                Self::teardown_local(shared);
                shared.observer.party_closed();
                false
            }
            Err(err) => {
                // Absorbed: the next tick retries naturally.
                debug!(party = %party_id, "state poll failed: {err}");
                true
            }
        }
    }

    /// One chat poll. Returns `false` when the loop should stop.
    async fn poll_chat_once(shared: &Arc<SessionShared>) -> bool {
        let (party_id, cursor) = {
            let state = shared.state.lock().expect("session lock");
            match &state.party {
                Some(party) => (party.id.clone(), state.chat_cursor),
                None => return false,
            }
        };

        match shared.api.chat_since(&party_id, cursor).await {
            Ok(response) => {
                {
                    let mut state =
                        shared.state.lock().expect("session lock");
                    if state.party.is_none() {
                        return false;
                    }
                    state.chat_cursor = Some(response.server_time);
                }
                for message in &response.messages {
                    shared.observer.chat_message(message);
                }
                true
            }
            Err(err) => {
                debug!(party = %party_id, "chat poll failed: {err}");
                true
            }
        }
    }

    /// Stop both loops and clear session state. Returns the party id the
    /// session was tracking, for the best-effort leave notification.
    fn teardown_local(shared: &Arc<SessionShared>) -> Option<PartyId> {
        {
            let mut tasks = shared.tasks.lock().expect("tasks lock");
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        let mut state = shared.state.lock().expect("session lock");
        let party_id = state.party.as_ref().map(|p| p.id.clone());
        state.clear();
        party_id
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let mut tasks = self.tasks.lock().expect("tasks lock");
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

fn dispatch(observer: &dyn PartyObserver, event: &SessionEvent) {
    match event {
        SessionEvent::Synced {
            current_time,
            is_playing,
        } => observer.playback_synced(*current_time, *is_playing),
        SessionEvent::Played => observer.played(),
        SessionEvent::Paused => observer.paused(),
        SessionEvent::MemberJoined(member) => observer.member_joined(member),
        SessionEvent::MemberLeft(user_id) => observer.member_left(user_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jamghat_model::PlaybackSnapshot;

    fn member(user_id: UserId, name: &str, is_host: bool) -> PartyMember {
        PartyMember {
            id: user_id,
            user_id,
            name: name.to_string(),
            avatar: None,
            is_host,
            last_seen_at: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
        }
    }

    fn party_with(
        host: UserId,
        members: Vec<PartyMember>,
        playback: PlaybackSnapshot,
    ) -> WatchParty {
        WatchParty {
            id: PartyId::parse("ABC234").expect("code"),
            content_id: ContentId::new(),
            content_kind: ContentKind::Movie,
            episode_id: None,
            host_id: host,
            members,
            playback,
            chat_count: 0,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap(),
            last_activity_at: Utc
                .with_ymd_and_hms(2026, 8, 1, 10, 0, 0)
                .unwrap(),
        }
    }

    fn snapshot(
        current_time: f64,
        is_playing: bool,
        second: u32,
    ) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_time,
            is_playing,
            updated_at: Utc
                .with_ymd_and_hms(2026, 8, 1, 10, 0, second)
                .unwrap(),
        }
    }

    fn state_tracking(party: WatchParty) -> SessionState {
        SessionState {
            party: Some(party),
            ..SessionState::default()
        }
    }

    fn response(party: WatchParty, second: u32) -> StateResponse {
        StateResponse {
            party,
            server_time: Utc
                .with_ymd_and_hms(2026, 8, 1, 10, 0, second)
                .unwrap(),
        }
    }

    #[test]
    fn member_diff_fires_one_join_and_one_leave() {
        let host = UserId::new();
        let me = UserId::new();
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();

        let before = party_with(
            host,
            vec![
                member(host, "Host", true),
                member(me, "Me", false),
                member(a, "A", false),
                member(b, "B", false),
            ],
            snapshot(0.0, false, 0),
        );
        let after = party_with(
            host,
            vec![
                member(host, "Host", true),
                member(me, "Me", false),
                member(b, "B", false),
                member(c, "C", false),
            ],
            snapshot(0.0, false, 0),
        );

        let mut state = state_tracking(before);
        let events = state.apply_state_response(response(after, 1), &me, 1.0);

        let joins: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::MemberJoined(m) => Some(m.user_id),
                _ => None,
            })
            .collect();
        let leaves: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::MemberLeft(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(joins, vec![c]);
        assert_eq!(leaves, vec![a]);
    }

    #[test]
    fn large_delta_hard_seeks_small_delta_does_not() {
        let host = UserId::new();
        let me = UserId::new();
        let members =
            vec![member(host, "Host", true), member(me, "Me", false)];

        let before =
            party_with(host, members.clone(), snapshot(0.0, false, 0));
        let mut state = state_tracking(before);

        // 42 s from a base of 0: hard seek.
        let after =
            party_with(host, members.clone(), snapshot(42.0, true, 1));
        let events = state.apply_state_response(response(after, 1), &me, 1.0);
        assert!(events.contains(&SessionEvent::Synced {
            current_time: 42.0,
            is_playing: true
        }));
        assert_eq!(state.last_known_time, 42.0);

        // 0.4 s of drift with no flag flip: nothing.
        let after =
            party_with(host, members.clone(), snapshot(42.4, true, 2));
        let events = state.apply_state_response(response(after, 2), &me, 1.0);
        assert!(events.is_empty());

        // Sub-tolerance drift but the host paused: pause without a seek.
        let after =
            party_with(host, members.clone(), snapshot(42.8, false, 3));
        let events = state.apply_state_response(response(after, 3), &me, 1.0);
        assert_eq!(events, vec![SessionEvent::Paused]);
    }

    #[test]
    fn delta_exactly_at_tolerance_is_not_a_seek() {
        let host = UserId::new();
        let me = UserId::new();
        let members =
            vec![member(host, "Host", true), member(me, "Me", false)];

        let mut state = state_tracking(party_with(
            host,
            members.clone(),
            snapshot(0.0, true, 0),
        ));
        let after =
            party_with(host, members.clone(), snapshot(1.0, true, 1));
        let events = state.apply_state_response(response(after, 1), &me, 1.0);
        assert!(events.is_empty());
    }

    #[test]
    fn stale_snapshots_are_never_applied() {
        let host = UserId::new();
        let me = UserId::new();
        let members =
            vec![member(host, "Host", true), member(me, "Me", false)];

        let mut state = state_tracking(party_with(
            host,
            members.clone(),
            snapshot(0.0, false, 0),
        ));

        let newer =
            party_with(host, members.clone(), snapshot(50.0, true, 8));
        let events = state.apply_state_response(response(newer, 8), &me, 1.0);
        assert_eq!(events.len(), 1);

        // A straggler response carrying an older snapshot arrives late.
        let stale =
            party_with(host, members.clone(), snapshot(10.0, true, 4));
        let events = state.apply_state_response(response(stale, 9), &me, 1.0);
        assert!(events.is_empty());
        assert_eq!(state.last_known_time, 50.0);
    }

    #[test]
    fn host_applies_no_playback_corrections() {
        let host = UserId::new();
        let members = vec![member(host, "Host", true)];

        let mut state = state_tracking(party_with(
            host,
            members.clone(),
            snapshot(0.0, false, 0),
        ));
        let after =
            party_with(host, members.clone(), snapshot(99.0, true, 1));
        let events =
            state.apply_state_response(response(after, 1), &host, 1.0);
        assert!(events.is_empty());
        assert!(state.is_host);
    }

    #[test]
    fn host_handoff_is_adopted_from_the_snapshot() {
        let old_host = UserId::new();
        let me = UserId::new();

        let before = party_with(
            old_host,
            vec![member(old_host, "Host", true), member(me, "Me", false)],
            snapshot(0.0, false, 0),
        );
        let mut state = state_tracking(before);
        assert!(!state.is_host);

        let after = party_with(
            me,
            vec![member(me, "Me", true)],
            snapshot(0.0, false, 0),
        );
        state.apply_state_response(response(after, 1), &me, 1.0);
        assert!(state.is_host);
    }

    #[test]
    fn response_after_teardown_is_dropped() {
        let host = UserId::new();
        let me = UserId::new();
        let mut state = SessionState::default();

        let late = party_with(
            host,
            vec![member(host, "Host", true)],
            snapshot(42.0, true, 1),
        );
        let events = state.apply_state_response(response(late, 1), &me, 1.0);
        assert!(events.is_empty());
        assert!(state.party.is_none());
    }
}
