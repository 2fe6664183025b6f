//! Integration tests: live `PartySession`s against a real server.
//!
//! The server binds an ephemeral loopback port; sessions poll it with
//! shortened intervals so convergence shows up in a few hundred
//! milliseconds.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jamghat_client::api_client::PartyApi;
use jamghat_client::events::PartyObserver;
use jamghat_client::session::{ClientIdentity, PartySession, SessionConfig};
use jamghat_model::{
    ChatMessage, ContentId, ContentKind, PartyId, PartyMember, UserId,
};
use jamghat_server::{AppState, PartyStore, StoreConfig, build_app};
use url::Url;

struct TestServer {
    base_url: Url,
    state: AppState,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::new(PartyStore::new(StoreConfig::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let app = build_app(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url: Url::parse(&format!("http://{addr}/"))
                .expect("base url"),
            state,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Observed {
    Synced(f64, bool),
    Played,
    Paused,
    Joined(UserId),
    Left(UserId),
    Chat(String),
    Closed,
}

#[derive(Debug, Default)]
struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<Observed> {
        self.events.lock().expect("events lock").clone()
    }

    fn push(&self, event: Observed) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl PartyObserver for RecordingObserver {
    fn playback_synced(&self, current_time: f64, is_playing: bool) {
        self.push(Observed::Synced(current_time, is_playing));
    }

    fn played(&self) {
        self.push(Observed::Played);
    }

    fn paused(&self) {
        self.push(Observed::Paused);
    }

    fn member_joined(&self, member: &PartyMember) {
        self.push(Observed::Joined(member.user_id));
    }

    fn member_left(&self, user_id: &UserId) {
        self.push(Observed::Left(*user_id));
    }

    fn chat_message(&self, message: &ChatMessage) {
        self.push(Observed::Chat(message.message.clone()));
    }

    fn party_closed(&self) {
        self.push(Observed::Closed);
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        state_poll_interval: Duration::from_millis(80),
        chat_poll_interval: Duration::from_millis(100),
        sync_throttle: Duration::from_secs(1),
        drift_tolerance: 1.0,
    }
}

fn session_for(
    server: &TestServer,
    name: &str,
) -> (PartySession, Arc<RecordingObserver>, UserId) {
    let observer = Arc::new(RecordingObserver::default());
    let user_id = UserId::new();
    let session = PartySession::new(
        server.base_url.clone(),
        ClientIdentity {
            user_id,
            name: name.to_string(),
            avatar: None,
        },
        observer.clone(),
        fast_config(),
    );
    (session, observer, user_id)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(350)).await;
}

async fn server_playback(
    server: &TestServer,
    party_id: &PartyId,
    as_user: UserId,
) -> (f64, bool) {
    let api = PartyApi::new(server.base_url.clone(), as_user);
    let state = api
        .party_state(party_id, None)
        .await
        .expect("state fetch");
    (
        state.party.playback.current_time,
        state.party.playback.is_playing,
    )
}

#[tokio::test]
async fn host_sync_hard_seeks_a_member_beyond_tolerance() {
    let server = TestServer::start().await;
    let (host, _host_events, host_id) = session_for(&server, "Aarati");
    let (member, member_events, _member_id) =
        session_for(&server, "Bibek");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    assert!(host.is_host());
    assert_eq!(party.host_id, host_id);

    member.join_party(&party.id).await.expect("join party");
    assert!(!member.is_host());
    settle().await;

    host.send_sync(42.0, true).await;
    settle().await;

    let events = member_events.events();
    assert!(
        events.contains(&Observed::Synced(42.0, true)),
        "member never applied the host snapshot: {events:?}"
    );
    let current = member.current_party().expect("party").playback;
    assert_eq!(current.current_time, 42.0);
    assert!(current.is_playing);

    member.leave_party().await;
    host.leave_party().await;
}

#[tokio::test]
async fn rapid_second_sync_is_dropped_by_the_throttle() {
    let server = TestServer::start().await;
    let (host, _events, host_id) = session_for(&server, "Aarati");
    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");

    host.send_sync(42.0, true).await;
    host.send_sync(55.0, true).await;

    let (time, playing) =
        server_playback(&server, &party.id, host_id).await;
    assert_eq!(time, 42.0, "second push inside the window must be dropped");
    assert!(playing);

    // Outside the window the next push lands.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    host.send_sync(77.0, false).await;
    let (time, playing) =
        server_playback(&server, &party.id, host_id).await;
    assert_eq!(time, 77.0);
    assert!(!playing);

    host.leave_party().await;
}

#[tokio::test]
async fn non_host_sync_is_never_transmitted() {
    let server = TestServer::start().await;
    let (host, _h, host_id) = session_for(&server, "Aarati");
    let (member, _m, _member_id) = session_for(&server, "Bibek");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    member.join_party(&party.id).await.expect("join party");

    host.send_sync(42.0, true).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    member.send_sync(99.0, false).await;

    let (time, playing) =
        server_playback(&server, &party.id, host_id).await;
    assert_eq!(time, 42.0);
    assert!(playing);

    member.leave_party().await;
    host.leave_party().await;
}

#[tokio::test]
async fn membership_changes_surface_as_join_and_leave_callbacks() {
    let server = TestServer::start().await;
    let (host, host_events, _host_id) = session_for(&server, "Aarati");
    let (first, _f, first_id) = session_for(&server, "Bibek");
    let (second, _s, second_id) = session_for(&server, "Chandra");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");

    first.join_party(&party.id).await.expect("join");
    settle().await;
    second.join_party(&party.id).await.expect("join");
    settle().await;
    second.leave_party().await;
    settle().await;

    let events = host_events.events();
    let joins_first = events
        .iter()
        .filter(|e| **e == Observed::Joined(first_id))
        .count();
    let joins_second = events
        .iter()
        .filter(|e| **e == Observed::Joined(second_id))
        .count();
    let leaves_second = events
        .iter()
        .filter(|e| **e == Observed::Left(second_id))
        .count();
    assert_eq!(joins_first, 1, "events: {events:?}");
    assert_eq!(joins_second, 1, "events: {events:?}");
    assert_eq!(leaves_second, 1, "events: {events:?}");
    assert!(!events.contains(&Observed::Left(first_id)));

    first.leave_party().await;
    host.leave_party().await;
}

#[tokio::test]
async fn expired_party_forces_local_teardown() {
    let server = TestServer::start().await;
    let (host, host_events, host_id) = session_for(&server, "Aarati");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    settle().await;

    // Delete the party out from under the session.
    server.state.store.leave(&party.id, &host_id);
    settle().await;

    assert!(host_events.events().contains(&Observed::Closed));
    assert!(host.current_party().is_none());
    assert!(!host.is_host());
}

#[tokio::test]
async fn leave_clears_local_state_even_when_the_server_is_gone() {
    let server = TestServer::start().await;
    let (host, _events, _host_id) = session_for(&server, "Aarati");

    host.create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    assert!(host.current_party().is_some());

    // Kill the server; the leave notification will fail on the wire.
    server.handle.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;

    host.leave_party().await;
    assert!(host.current_party().is_none());
    assert!(!host.is_host());
}

#[tokio::test]
async fn chat_messages_arrive_once_and_in_order() {
    let server = TestServer::start().await;
    let (host, _h, _host_id) = session_for(&server, "Aarati");
    let (member, member_events, _m) = session_for(&server, "Bibek");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    member.join_party(&party.id).await.expect("join");

    host.send_chat("pahilo").await.expect("chat");
    host.send_chat("dosro").await.expect("chat");
    settle().await;

    let chats: Vec<String> = member_events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Observed::Chat(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(chats, vec!["pahilo".to_string(), "dosro".to_string()]);

    member.leave_party().await;
    host.leave_party().await;
}

#[tokio::test]
async fn send_chat_without_a_party_is_an_error() {
    let server = TestServer::start().await;
    let (session, _events, _id) = session_for(&server, "Aarati");

    let err = session.send_chat("namaste").await.expect_err("no party");
    assert!(matches!(
        err,
        jamghat_client::api_client::ClientError::NoActiveParty
    ));
}

#[tokio::test]
async fn sub_tolerance_flip_pauses_without_a_seek() {
    let server = TestServer::start().await;
    let (host, _h, _host_id) = session_for(&server, "Aarati");
    let (member, member_events, _m) = session_for(&server, "Bibek");

    let party = host
        .create_party(ContentId::new(), ContentKind::Movie, None)
        .await
        .expect("create party");
    member.join_party(&party.id).await.expect("join");
    settle().await;

    host.send_sync(10.0, true).await;
    settle().await;
    tokio::time::sleep(Duration::from_millis(800)).await;

    // 0.3 s of drift with a pause: correct the flag, not the position.
    host.send_sync(10.3, false).await;
    settle().await;

    let events = member_events.events();
    let syncs = events
        .iter()
        .filter(|e| matches!(e, Observed::Synced(..)))
        .count();
    assert_eq!(syncs, 1, "only the initial divergence seeks: {events:?}");
    assert!(events.contains(&Observed::Paused), "events: {events:?}");

    member.leave_party().await;
    host.leave_party().await;
}
