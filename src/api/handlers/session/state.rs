//! Guard configuration and shared session state.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::fingerprint::{DeviceFingerprint, NEUTRAL_TRUST, trust_score};
use crate::session::{
    Assessment, DEFAULT_TRUST_DECAY, Session, SessionStore, StoreError, assess,
    generate_session_token, hash_session_token,
};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Clone, Debug)]
pub struct GuardConfig {
    session_ttl_seconds: u64,
    history_limit: usize,
    trust_decay: f64,
    cookie_secure: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            trust_decay: DEFAULT_TRUST_DECAY,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    #[must_use]
    pub fn with_trust_decay(mut self, decay: f64) -> Self {
        self.trust_decay = decay.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    #[must_use]
    pub fn trust_decay(&self) -> f64 {
        self.trust_decay
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

/// Session resolved for the current request and attached to its extensions.
#[derive(Clone, Debug)]
pub struct ActiveSession {
    /// Store key (hash of the cookie token).
    pub key: String,
    pub session: Session,
}

/// Result of resolving a request's session token.
pub(super) struct Resolved {
    pub(super) active: ActiveSession,
    /// Raw token to send back when the session was just issued.
    pub(super) issued_token: Option<String>,
}

pub struct SessionGuard {
    config: GuardConfig,
    store: Arc<dyn SessionStore>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(config: GuardConfig, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Load the session for `token`, or issue a new one when the token is
    /// missing or unknown.
    pub(super) async fn resolve(&self, token: Option<String>) -> anyhow::Result<Resolved> {
        if let Some(token) = token {
            let key = hash_session_token(&token);
            if let Some(session) = self.store.load(&key).await? {
                return Ok(Resolved {
                    active: ActiveSession { key, session },
                    issued_token: None,
                });
            }
            debug!("Unknown session token, issuing a new session");
        }

        let token = generate_session_token()?;
        Ok(Resolved {
            active: ActiveSession {
                key: hash_session_token(&token),
                session: Session::new(),
            },
            issued_token: Some(token),
        })
    }

    /// Run the risk state machine for the request fingerprint.
    pub(super) fn assess(&self, session: &mut Session, current: DeviceFingerprint) -> Assessment {
        assess(session, current, self.config.trust_decay)
    }

    /// Write the session back with a refreshed TTL.
    ///
    /// # Errors
    /// Returns an error if the store rejects the write.
    pub async fn save(&self, active: &ActiveSession) -> Result<(), StoreError> {
        self.store
            .save(&active.key, &active.session, self.config.session_ttl())
            .await
    }

    /// Remove the session from the store.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    pub async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        self.store.destroy(key).await
    }

    /// Append a fingerprint to the principal's bounded history.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    pub async fn record_history(
        &self,
        user_id: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<(), StoreError> {
        self.store
            .push_history(user_id, fingerprint, self.config.history_limit)
            .await
    }

    /// Trust score of `current` against the principal's recorded history.
    ///
    /// # Errors
    /// Returns an error if the history cannot be read.
    pub async fn history_trust(
        &self,
        user_id: &str,
        current: &DeviceFingerprint,
    ) -> Result<f64, StoreError> {
        let history = self.store.history(user_id).await?;
        Ok(trust_score(current, &history))
    }

    /// Bind a principal to an existing session after login.
    ///
    /// The session trust score is recomputed from the principal's history and
    /// the current fingerprint is recorded. Returns `None` when the session is
    /// unknown.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    pub async fn bind_user(&self, key: &str, user_id: &str) -> Result<Option<f64>, StoreError> {
        let Some(mut session) = self.store.load(key).await? else {
            return Ok(None);
        };

        let score = match session.fingerprint.as_ref() {
            Some(fingerprint) => {
                let score = self.history_trust(user_id, fingerprint).await?;
                self.record_history(user_id, fingerprint).await?;
                score
            }
            None => NEUTRAL_TRUST,
        };

        session.user_id = Some(user_id.to_string());
        session.trust_score = score;
        self.save(&ActiveSession {
            key: key.to_string(),
            session,
        })
        .await?;

        info!(user_id, trust_score = score, "Bound principal to session");

        Ok(Some(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn config_defaults() {
        let config = GuardConfig::new();
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.history_limit(), DEFAULT_HISTORY_LIMIT);
        assert!((config.trust_decay() - DEFAULT_TRUST_DECAY).abs() < f64::EPSILON);
        assert!(!config.cookie_secure());
    }

    #[test]
    fn config_builder_clamps_decay() {
        let config = GuardConfig::new()
            .with_session_ttl_seconds(60)
            .with_history_limit(3)
            .with_trust_decay(1.5)
            .with_cookie_secure(true);
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.history_limit(), 3);
        assert!((config.trust_decay() - 1.0).abs() < f64::EPSILON);
        assert!(config.cookie_secure());
    }

    #[tokio::test]
    async fn resolve_issues_session_for_unknown_token() -> anyhow::Result<()> {
        let guard = SessionGuard::new(GuardConfig::new(), Arc::new(MemorySessionStore::new()));

        let fresh = guard.resolve(None).await?;
        let token = fresh.issued_token.clone();
        assert!(token.is_some());

        let unknown = guard.resolve(Some("nope".to_string())).await?;
        assert!(unknown.issued_token.is_some());
        assert_ne!(unknown.active.key, hash_session_token("nope"));

        guard.save(&fresh.active).await?;
        let known = guard.resolve(token).await?;
        assert!(known.issued_token.is_none());
        assert_eq!(known.active.key, fresh.active.key);
        Ok(())
    }

    #[tokio::test]
    async fn bind_user_unknown_session_is_none() -> anyhow::Result<()> {
        let guard = SessionGuard::new(GuardConfig::new(), Arc::new(MemorySessionStore::new()));
        assert_eq!(guard.bind_user("missing", "user-1").await?, None);
        Ok(())
    }
}
