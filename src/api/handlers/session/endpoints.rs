//! Session introspection and logout endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::{
    middleware::clear_session_cookie,
    state::{ActiveSession, SessionGuard},
    types::{RejectionResponse, SessionResponse},
};

#[utoipa::path(
    get,
    path = "/v1/session",
    responses(
        (status = 200, description = "Current session and its trust score", body = SessionResponse),
        (status = 401, description = "Fingerprint validation failed, session destroyed", body = RejectionResponse),
        (status = 500, description = "Session store unavailable")
    ),
    tag = "session"
)]
pub async fn current(
    Extension(active): Extension<ActiveSession>,
    Extension(guard): Extension<Arc<SessionGuard>>,
) -> impl IntoResponse {
    let session = &active.session;

    let history_trust = match (session.user_id.as_deref(), session.fingerprint.as_ref()) {
        (Some(user_id), Some(fingerprint)) => {
            match guard.history_trust(user_id, fingerprint).await {
                Ok(score) => Some(score),
                Err(err) => {
                    error!("Failed to read fingerprint history: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
        _ => None,
    };

    let response = SessionResponse {
        trust_score: session.trust_score,
        fingerprint: session.fingerprint.as_ref().map(|fp| fp.hash.clone()),
        user_id: session.user_id.clone(),
        created_at: session.created_at.to_rfc3339(),
        history_trust,
    };

    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/session/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "session"
)]
pub async fn logout(
    Extension(active): Extension<ActiveSession>,
    Extension(guard): Extension<Arc<SessionGuard>>,
) -> impl IntoResponse {
    if let Err(err) = guard.destroy(&active.key).await {
        error!("Failed to delete session: {err}");
    }

    // Always clear the cookie, even if the store delete failed.
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(guard.config()) {
        headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}
