//! Session middleware tests against the full router and an in-memory store.

use super::{FINGERPRINT_REJECTION_CODE, GuardConfig, SESSION_COOKIE_NAME, SessionGuard};
use crate::api::app;
use crate::fingerprint::DeviceFingerprint;
use crate::session::{MemorySessionStore, Session, SessionStore, StoreError, hash_session_token};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::SET_COOKIE},
    response::Response,
};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tower::ServiceExt;

/// In-memory store whose individual operations can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemorySessionStore,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
    fail_destroy: AtomicBool,
}

impl FlakyStore {
    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Timeout(Duration::from_millis(1)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, StoreError> {
        Self::check(&self.fail_load)?;
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, session: &Session, ttl: Duration) -> Result<(), StoreError> {
        Self::check(&self.fail_save)?;
        self.inner.save(key, session, ttl).await
    }

    async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_destroy)?;
        self.inner.destroy(key).await
    }

    async fn history(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>, StoreError> {
        self.inner.history(user_id).await
    }

    async fn push_history(
        &self,
        user_id: &str,
        fingerprint: &DeviceFingerprint,
        limit: usize,
    ) -> Result<(), StoreError> {
        self.inner.push_history(user_id, fingerprint, limit).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

struct Harness {
    app: Router,
    guard: Arc<SessionGuard>,
    store: Arc<FlakyStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(FlakyStore::default());
        let guard = Arc::new(SessionGuard::new(GuardConfig::new(), store.clone()));
        Self {
            app: app(guard.clone()),
            guard,
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.app.clone().oneshot(request).await?)
    }

    async fn session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.store.inner.load(&hash_session_token(token)).await?)
    }
}

fn request(
    method: Method,
    path: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("cookie", format!("{SESSION_COOKIE_NAME}={token}"));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    Ok(builder.body(Body::empty())?)
}

fn browser(ip: &'static str, ua: &'static str, lang: &'static str) -> [(&'static str, &'static str); 4] {
    [
        ("x-forwarded-for", ip),
        ("user-agent", ua),
        ("accept-language", lang),
        ("accept-encoding", "gzip"),
    ]
}

fn issued_token(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let (pair, _) = cookie.split_once(';')?;
            let (name, value) = pair.split_once('=')?;
            (name == SESSION_COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
        })
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Issue a session with the given request fingerprint and return its token.
async fn open_session(harness: &Harness, headers: &[(&str, &str)]) -> Result<String> {
    let response = harness
        .send(request(Method::GET, "/v1/session", None, headers)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    issued_token(&response).context("session cookie not issued")
}

#[tokio::test]
async fn fresh_session_stores_fingerprint_with_neutral_trust() -> Result<()> {
    let harness = Harness::new();
    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            None,
            &[("x-forwarded-for", "1.2.3.4"), ("user-agent", "X")],
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let token = issued_token(&response).context("session cookie not issued")?;

    let body = json_body(response).await?;
    assert_eq!(body["trustScore"].as_f64(), Some(0.5));

    let session = harness.session(&token).await?.context("session not stored")?;
    let fingerprint = session.fingerprint.context("fingerprint not stored")?;
    assert_eq!(fingerprint.hash.len(), 64);
    assert_eq!(fingerprint.ip, "1.2.3.4");
    assert!((session.trust_score - 0.5).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn user_agent_change_destroys_session() -> Result<()> {
    let harness = Harness::new();
    let token = open_session(&harness, &browser("1.2.3.4", "A", "en")).await?;

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&token),
            &browser("1.2.3.4", "B", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookie| cookie.contains("Max-Age=0"));
    assert!(cleared);

    let body = json_body(response).await?;
    assert_eq!(body["code"].as_str(), Some(FINGERPRINT_REJECTION_CODE));
    assert!(body["error"].is_string());
    assert!(body["message"].is_string());

    assert!(harness.session(&token).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn language_change_decays_trust_and_continues() -> Result<()> {
    let harness = Harness::new();
    let token = open_session(&harness, &browser("1.2.3.4", "A", "en")).await?;
    let previous = harness
        .session(&token)
        .await?
        .context("session not stored")?
        .trust_score;

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&token),
            &browser("1.2.3.4", "A", "fr"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(issued_token(&response).is_none());

    let session = harness.session(&token).await?.context("session missing")?;
    assert!((session.trust_score - previous * 0.8).abs() < 1e-9);
    assert_eq!(
        session
            .fingerprint
            .and_then(|fp| fp.accept_language)
            .as_deref(),
        Some("fr")
    );
    Ok(())
}

#[tokio::test]
async fn roaming_ip_keeps_session_untouched() -> Result<()> {
    let harness = Harness::new();
    let token = open_session(&harness, &browser("1.2.3.4", "A", "en")).await?;
    let before = harness.session(&token).await?.context("session missing")?;

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&token),
            &browser("5.6.7.8", "A", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let after = harness.session(&token).await?.context("session missing")?;
    assert_eq!(after, before);
    Ok(())
}

#[tokio::test]
async fn unknown_token_gets_new_session() -> Result<()> {
    let harness = Harness::new();
    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some("stale-token"),
            &browser("1.2.3.4", "A", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let token = issued_token(&response).context("session cookie not issued")?;
    assert_ne!(token, "stale-token");
    assert!(harness.session(&token).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn logout_destroys_session() -> Result<()> {
    let harness = Harness::new();
    let headers = browser("1.2.3.4", "A", "en");
    let token = open_session(&harness, &headers).await?;

    let response = harness
        .send(request(
            Method::POST,
            "/v1/session/logout",
            Some(&token),
            &headers,
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.session(&token).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn logout_without_session_only_clears_cookie() -> Result<()> {
    let harness = Harness::new();
    let response = harness
        .send(request(
            Method::POST,
            "/v1/session/logout",
            None,
            &browser("1.2.3.4", "A", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(issued_token(&response).is_none());

    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn load_failure_is_internal_error() -> Result<()> {
    let harness = Harness::new();
    harness.store.fail_load.store(true, Ordering::SeqCst);

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some("some-token"),
            &browser("1.2.3.4", "A", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(issued_token(&response).is_none());
    Ok(())
}

#[tokio::test]
async fn destroy_failure_on_rejection_is_internal_error() -> Result<()> {
    let harness = Harness::new();
    let token = open_session(&harness, &browser("1.2.3.4", "A", "en")).await?;
    harness.store.fail_destroy.store(true, Ordering::SeqCst);

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&token),
            &browser("1.2.3.4", "B", "en"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(harness.session(&token).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn save_failure_on_drift_is_internal_error() -> Result<()> {
    let harness = Harness::new();
    let token = open_session(&harness, &browser("1.2.3.4", "A", "en")).await?;
    harness.store.fail_save.store(true, Ordering::SeqCst);

    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&token),
            &browser("1.2.3.4", "A", "fr"),
        )?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The stored fingerprint is unchanged.
    let session = harness.session(&token).await?.context("session missing")?;
    assert_eq!(
        session
            .fingerprint
            .and_then(|fp| fp.accept_language)
            .as_deref(),
        Some("en")
    );
    Ok(())
}

#[tokio::test]
async fn health_does_not_issue_sessions() -> Result<()> {
    let harness = Harness::new();
    let response = harness
        .send(request(Method::GET, "/health", None, &[])?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(issued_token(&response).is_none());
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn bound_user_history_feeds_trust() -> Result<()> {
    let harness = Harness::new();
    let headers = browser("1.2.3.4", "A", "en");
    let token = open_session(&harness, &headers).await?;
    let key = hash_session_token(&token);

    // No history yet: neutral.
    assert_eq!(harness.guard.bind_user(&key, "user-1").await?, Some(0.5));

    // Same device again: history matches fully.
    let second = open_session(&harness, &headers).await?;
    assert_eq!(
        harness
            .guard
            .bind_user(&hash_session_token(&second), "user-1")
            .await?,
        Some(1.0)
    );

    // Medium drift on a bound session records the new fingerprint.
    let response = harness
        .send(request(
            Method::GET,
            "/v1/session",
            Some(&second),
            &browser("1.2.3.4", "A", "fr"),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["userId"].as_str(), Some("user-1"));

    let history = harness.store.history("user-1").await?;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].accept_language.as_deref(), Some("fr"));

    // Current "fr" fingerprint matches 1 of 3 entries; the two "en" entries
    // cost 0.3 each: (1.0 - 0.6) * 1/3.
    let history_trust = body["historyTrust"].as_f64().context("historyTrust missing")?;
    assert!((history_trust - 0.4 / 3.0).abs() < 1e-9);
    Ok(())
}
