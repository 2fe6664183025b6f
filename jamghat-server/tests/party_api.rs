//! End-to-end tests for the party API over the full router stack.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use jamghat_server::{AppState, PartyStore, StoreConfig, build_app};
use serde_json::{Value, json};
use uuid::Uuid;

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::new(PartyStore::new(StoreConfig::default()));
        Self {
            router: build_app(state),
        }
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .expect("infallible router")
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.request(request).await
    }

    async fn create_party(&self, user: Uuid, name: &str) -> Value {
        let response = self
            .send(
                "POST",
                "/api/party",
                Some(user),
                Some(json!({
                    "contentId": Uuid::now_v7().to_string(),
                    "contentType": "movie",
                    "userName": name,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = TestApp::new();
    let response = app.send("POST", "/api/party", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_join_and_poll_state() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let guest = Uuid::now_v7();

    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();
    assert_eq!(party["hostId"], host.to_string());
    assert_eq!(party["members"].as_array().expect("members").len(), 1);

    let joined = app
        .send(
            "POST",
            &format!("/api/party/{id}/join"),
            Some(guest),
            Some(json!({"userName": "Bibek"})),
        )
        .await;
    assert_eq!(joined.status(), StatusCode::OK);

    let state = app
        .send(
            "GET",
            &format!("/api/party/{id}/state"),
            Some(guest),
            None,
        )
        .await;
    assert_eq!(state.status(), StatusCode::OK);
    let state = body_json(state).await;
    assert_eq!(state["members"].as_array().expect("members").len(), 2);
    assert!(state["serverTime"].is_string());
    assert_eq!(state["playback"]["isPlaying"], false);
}

#[tokio::test]
async fn join_of_unknown_party_is_not_found() {
    let app = TestApp::new();
    let response = app
        .send(
            "POST",
            "/api/party/ZZZZZZ/join",
            Some(Uuid::now_v7()),
            Some(json!({"userName": "Bibek"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_party_codes_are_bad_requests() {
    let app = TestApp::new();
    let response = app
        .send(
            "GET",
            "/api/party/nope!/state",
            Some(Uuid::now_v7()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_is_host_only_and_visible_to_members() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let guest = Uuid::now_v7();

    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();
    app.send(
        "POST",
        &format!("/api/party/{id}/join"),
        Some(guest),
        Some(json!({"userName": "Bibek"})),
    )
    .await;

    let forbidden = app
        .send(
            "POST",
            &format!("/api/party/{id}/sync"),
            Some(guest),
            Some(json!({"currentTime": 99.0, "isPlaying": true})),
        )
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let ok = app
        .send(
            "POST",
            &format!("/api/party/{id}/sync"),
            Some(host),
            Some(json!({"currentTime": 42.0, "isPlaying": true})),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let state = body_json(
        app.send(
            "GET",
            &format!("/api/party/{id}/state"),
            Some(guest),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(state["playback"]["currentTime"], 42.0);
    assert_eq!(state["playback"]["isPlaying"], true);
}

#[tokio::test]
async fn sync_rejects_non_finite_positions() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();

    let response = app
        .send(
            "POST",
            &format!("/api/party/{id}/sync"),
            Some(host),
            Some(json!({"currentTime": -5.0, "isPlaying": false})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_round_trip_with_since_cursor() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();

    let posted = app
        .send(
            "POST",
            &format!("/api/party/{id}/chat"),
            Some(host),
            Some(json!({"message": "  namaste  ", "userName": "Aarati"})),
        )
        .await;
    assert_eq!(posted.status(), StatusCode::CREATED);
    let posted = body_json(posted).await;
    assert_eq!(posted["message"], "namaste");

    let history = body_json(
        app.send(
            "GET",
            &format!("/api/party/{id}/chat"),
            Some(host),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(history["messages"].as_array().expect("messages").len(), 1);
    let cursor = history["serverTime"].as_str().expect("cursor");

    let newer = body_json(
        app.send(
            "GET",
            &format!("/api/party/{id}/chat?since={}", urlencode(cursor)),
            Some(host),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(newer["messages"].as_array().expect("messages").len(), 0);
}

#[tokio::test]
async fn empty_chat_messages_are_rejected() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();

    let response = app
        .send(
            "POST",
            &format!("/api/party/{id}/chat"),
            Some(host),
            Some(json!({"message": "   ", "userName": "Aarati"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn host_leaving_promotes_and_state_reflects_it() {
    let app = TestApp::new();
    let host = Uuid::now_v7();
    let guest = Uuid::now_v7();

    let party = app.create_party(host, "Aarati").await;
    let id = party["id"].as_str().expect("party id").to_string();
    app.send(
        "POST",
        &format!("/api/party/{id}/join"),
        Some(guest),
        Some(json!({"userName": "Bibek"})),
    )
    .await;

    let left = app
        .send(
            "POST",
            &format!("/api/party/{id}/leave"),
            Some(host),
            None,
        )
        .await;
    assert_eq!(left.status(), StatusCode::NO_CONTENT);

    let state = body_json(
        app.send(
            "GET",
            &format!("/api/party/{id}/state"),
            Some(guest),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(state["hostId"], guest.to_string());

    // Last member out deletes the party; polls now 404.
    app.send(
        "POST",
        &format!("/api/party/{id}/leave"),
        Some(guest),
        None,
    )
    .await;
    let gone = app
        .send(
            "GET",
            &format!("/api/party/{id}/state"),
            Some(guest),
            None,
        )
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

/// Minimal percent-encoding for RFC 3339 cursors in query strings.
fn urlencode(raw: &str) -> String {
    raw.replace('+', "%2B").replace(':', "%3A")
}
