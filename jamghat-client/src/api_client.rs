//! Typed HTTP client for the party sync API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jamghat_model::api::{
    ChatHistoryResponse, CreatePartyRequest, JoinPartyRequest,
    PostChatRequest, StateResponse, SyncRequest, SyncResponse,
};
use jamghat_model::{ChatMessage, PartyId, UserId, WatchParty};
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

/// Header carrying the authenticated account id, forwarded by the
/// gateway in production and set directly here for first-party clients.
const USER_ID_HEADER: &str = "x-user-id";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by party API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The party no longer exists server-side (expired or deleted).
    #[error("watch party not found or expired")]
    PartyGone,

    /// The server refused the request.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An operation that needs a live party was called without one.
    #[error("no active watch party")]
    NoActiveParty,
}

/// Thin typed wrapper around the party endpoints.
#[derive(Debug, Clone)]
pub struct PartyApi {
    http_client: Client,
    base_url: Url,
    user_id: UserId,
}

impl PartyApi {
    pub fn new(base_url: Url, user_id: UserId) -> Self {
        Self {
            http_client: Client::builder()
                .pool_max_idle_per_host(4)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            user_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}api/party{path}", self.base_url)
    }

    fn prepared(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(USER_ID_HEADER, self.user_id.to_string())
            .timeout(REQUEST_TIMEOUT)
    }

    pub async fn create_party(
        &self,
        request: &CreatePartyRequest,
    ) -> Result<WatchParty, ClientError> {
        let response = self
            .prepared(self.http_client.post(self.endpoint("")))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn join_party(
        &self,
        id: &PartyId,
        request: &JoinPartyRequest,
    ) -> Result<WatchParty, ClientError> {
        let response = self
            .prepared(
                self.http_client
                    .post(self.endpoint(&format!("/{id}/join"))),
            )
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn party_state(
        &self,
        id: &PartyId,
        since: Option<DateTime<Utc>>,
    ) -> Result<StateResponse, ClientError> {
        let mut builder = self
            .http_client
            .get(self.endpoint(&format!("/{id}/state")));
        if let Some(since) = since {
            builder = builder.query(&[("since", since.to_rfc3339())]);
        }
        let response = self.prepared(builder).send().await?;
        decode(response).await
    }

    pub async fn sync(
        &self,
        id: &PartyId,
        request: SyncRequest,
    ) -> Result<SyncResponse, ClientError> {
        let response = self
            .prepared(
                self.http_client
                    .post(self.endpoint(&format!("/{id}/sync"))),
            )
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn chat_since(
        &self,
        id: &PartyId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ChatHistoryResponse, ClientError> {
        let mut builder = self
            .http_client
            .get(self.endpoint(&format!("/{id}/chat")));
        if let Some(since) = since {
            builder = builder.query(&[("since", since.to_rfc3339())]);
        }
        let response = self.prepared(builder).send().await?;
        decode(response).await
    }

    pub async fn post_chat(
        &self,
        id: &PartyId,
        request: &PostChatRequest,
    ) -> Result<ChatMessage, ClientError> {
        let response = self
            .prepared(
                self.http_client
                    .post(self.endpoint(&format!("/{id}/chat"))),
            )
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    /// Best-effort: callers are expected to ignore the result.
    pub async fn leave(&self, id: &PartyId) -> Result<(), ClientError> {
        let response = self
            .prepared(
                self.http_client
                    .post(self.endpoint(&format!("/{id}/leave"))),
            )
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejection(response).await)
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if response.status().is_success() {
        Ok(response.json::<T>().await?)
    } else {
        Err(rejection(response).await)
    }
}

async fn rejection(response: reqwest::Response) -> ClientError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ClientError::PartyGone;
    }
    let message = match response.json::<serde_json::Value>().await {
        Ok(body) => body["error"]["message"]
            .as_str()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => "request failed".to_string(),
    };
    ClientError::Rejected {
        status: status.as_u16(),
        message,
    }
}
