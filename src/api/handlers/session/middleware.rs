//! Session risk middleware.
//!
//! Flow Overview: resolve (or issue) the session from the cookie, fingerprint
//! the request, run the risk state machine, then either refuse the request
//! (high risk) or persist any mutation and hand the session to the handler.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, warn};

use super::{
    state::{GuardConfig, SessionGuard},
    types::RejectionResponse,
};
use crate::fingerprint::{RequestInfo, extract};
use crate::session::RiskOutcome;

pub const SESSION_COOKIE_NAME: &str = "guardian_session";
pub const FINGERPRINT_REJECTION_CODE: &str = "FINGERPRINT_VALIDATION_FAILED";

pub async fn session_risk(
    State(guard): State<Arc<SessionGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_session_token(request.headers());
    let mut resolved = match guard.resolve(token).await {
        Ok(resolved) => resolved,
        Err(err) => {
            error!("Failed to resolve session: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let current = extract(&RequestInfo::new(request.headers(), peer));

    let assessment = guard.assess(&mut resolved.active.session, current);

    match &assessment.outcome {
        RiskOutcome::Rejected(result) => {
            if let Err(err) = guard.destroy(&resolved.active.key).await {
                error!("Failed to destroy session: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            warn!(
                risk = %result.risk,
                changes = %result.describe_changes(),
                "Session destroyed after fingerprint validation failure"
            );
            return fingerprint_rejection(guard.config());
        }
        RiskOutcome::Drifted(_) => {
            if let (Some(user_id), Some(fingerprint)) = (
                resolved.active.session.user_id.as_deref(),
                resolved.active.session.fingerprint.as_ref(),
            ) && let Err(err) = guard.record_history(user_id, fingerprint).await
            {
                error!("Failed to record fingerprint history: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        RiskOutcome::Initialized | RiskOutcome::Accepted(_) => {}
    }

    if (assessment.outcome.is_mutated() || resolved.issued_token.is_some())
        && let Err(err) = guard.save(&resolved.active).await
    {
        error!("Failed to save session: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    request.extensions_mut().insert(resolved.active);

    let mut response = next.run(request).await;

    // A handler that already set the session cookie (logout) owns it.
    if let Some(token) = resolved.issued_token
        && !sets_session_cookie(response.headers())
    {
        match session_cookie(guard.config(), &token) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }

    response
}

fn fingerprint_rejection(config: &GuardConfig) -> Response {
    let body = Json(RejectionResponse {
        error: "Unauthorized".to_string(),
        message: "Session fingerprint validation failed, please sign in again".to_string(),
        code: FINGERPRINT_REJECTION_CODE.to_string(),
    });

    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(config) {
        headers.insert(SET_COOKIE, cookie);
    }

    (StatusCode::UNAUTHORIZED, headers, body).into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &GuardConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(config: &GuardConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn sets_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|cookie| {
            cookie
                .split_once('=')
                .is_some_and(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        })
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
            .then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
