use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use jamghat_model::api::{
    ChatHistoryResponse, CreatePartyRequest, JoinPartyRequest,
    PostChatRequest, SinceQuery, StateResponse, SyncRequest, SyncResponse,
};
use jamghat_model::{ChatMessage, PartyId, WatchParty};
use tracing::debug;

use crate::{
    AppState,
    errors::{AppError, AppResult},
    identity::Identity,
};

fn parse_party_id(raw: &str) -> AppResult<PartyId> {
    PartyId::parse(raw)
        .map_err(|_| AppError::bad_request("Invalid party code"))
}

/// `POST /api/party`: create a party with the caller as host.
pub async fn create_party_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreatePartyRequest>,
) -> AppResult<(StatusCode, Json<WatchParty>)> {
    if request.user_name.trim().is_empty() {
        return Err(AppError::bad_request("userName is required"));
    }

    let party = state.store.create(identity.user_id, &request);
    Ok((StatusCode::CREATED, Json(party)))
}

/// `POST /api/party/{id}/join`
pub async fn join_party_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(request): Json<JoinPartyRequest>,
) -> AppResult<Json<WatchParty>> {
    if request.user_name.trim().is_empty() {
        return Err(AppError::bad_request("userName is required"));
    }

    let id = parse_party_id(&id)?;
    let party = state.store.join(
        &id,
        identity.user_id,
        &request.user_name,
        request.user_avatar.as_deref(),
    )?;
    Ok(Json(party))
}

/// `GET /api/party/{id}/state`: poll the full party snapshot.
///
/// `since` is accepted as the cursor clients echo back; the response is
/// always the complete snapshot.
pub async fn party_state_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Query(query): Query<SinceQuery>,
) -> AppResult<Json<StateResponse>> {
    let id = parse_party_id(&id)?;
    debug!(party = %id, since = ?query.since, "state poll");

    let party = state.store.poll_state(&id, &identity.user_id)?;
    Ok(Json(StateResponse {
        party,
        server_time: Utc::now(),
    }))
}

/// `POST /api/party/{id}/sync`: host pushes the authoritative snapshot.
pub async fn sync_playback_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(request): Json<SyncRequest>,
) -> AppResult<Json<SyncResponse>> {
    if !request.current_time.is_finite() || request.current_time < 0.0 {
        return Err(AppError::bad_request(
            "currentTime must be a non-negative number",
        ));
    }

    let id = parse_party_id(&id)?;
    let playback = state.store.sync(&id, &identity.user_id, request)?;
    Ok(Json(SyncResponse { playback }))
}

/// `GET /api/party/{id}/chat`: messages newer than the cursor.
pub async fn chat_history_handler(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Path(id): Path<String>,
    Query(query): Query<SinceQuery>,
) -> AppResult<Json<ChatHistoryResponse>> {
    let id = parse_party_id(&id)?;
    let messages = state.store.chat_since(&id, query.since)?;
    Ok(Json(ChatHistoryResponse {
        messages,
        server_time: Utc::now(),
    }))
}

/// `POST /api/party/{id}/chat`
pub async fn post_chat_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(request): Json<PostChatRequest>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let id = parse_party_id(&id)?;
    let message = state.store.post_chat(
        &id,
        &identity.user_id,
        &request.user_name,
        request.user_avatar.as_deref(),
        &request.message,
    )?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/party/{id}/leave`: best-effort departure.
///
/// Succeeds whether or not the party still exists; clients tear down
/// locally regardless of this response.
pub async fn leave_party_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_party_id(&id)?;
    state.store.leave(&id, &identity.user_id);
    Ok(StatusCode::NO_CONTENT)
}
