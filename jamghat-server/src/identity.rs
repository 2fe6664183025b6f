//! Caller identity, as forwarded by the fronting gateway.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the gateway has verified the session and forwards the account
//! id in a trusted header. Requests without it are rejected outright.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jamghat_model::UserId;
use uuid::Uuid;

use crate::errors::AppError;

/// Header carrying the authenticated account id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, available to handlers as an `Extension`.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: UserId,
}

fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let raw = headers.get(USER_ID_HEADER)?.to_str().ok()?;
    let user_id = raw.parse::<Uuid>().ok()?;
    Some(Identity {
        user_id: UserId(user_id),
    })
}

/// Middleware: require a forwarded identity on every request.
pub async fn require_identity(
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(identity) = identity_from_headers(request.headers()) else {
        return Err(AppError::unauthorized("Not authenticated"));
    };
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
