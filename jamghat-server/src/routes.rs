use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    AppState,
    handlers::party_handlers::{
        chat_history_handler, create_party_handler, join_party_handler,
        leave_party_handler, party_state_handler, post_chat_handler,
        sync_playback_handler,
    },
    identity::require_identity,
};

/// Create all party API routes.
///
/// Every route requires a gateway-forwarded identity.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/party", post(create_party_handler))
        .route("/api/party/{id}/join", post(join_party_handler))
        .route("/api/party/{id}/state", get(party_state_handler))
        .route("/api/party/{id}/sync", post(sync_playback_handler))
        .route(
            "/api/party/{id}/chat",
            get(chat_history_handler).post(post_chat_handler),
        )
        .route("/api/party/{id}/leave", post(leave_party_handler))
        .layer(middleware::from_fn(require_identity))
}

/// Full application: API routes plus cross-cutting layers.
pub fn build_app(state: AppState) -> Router {
    create_api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
