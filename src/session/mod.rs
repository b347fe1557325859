//! Session state and the storage seam behind it.
//!
//! Sessions are keyed by the SHA-256 of the cookie token, so raw tokens never
//! reach the store. Two backends implement [`SessionStore`]: Redis for shared
//! deployments and an in-process map for single nodes and tests.

mod memory;
mod redis;
pub mod risk;
mod token;

pub use self::memory::MemorySessionStore;
pub use self::redis::RedisSessionStore;
pub use self::risk::{Assessment, DEFAULT_TRUST_DECAY, RiskOutcome, assess};
pub use self::token::{generate_session_token, hash_session_token};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fingerprint::{DeviceFingerprint, NEUTRAL_TRUST};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session backend error: {0}")]
    Backend(#[from] ::redis::RedisError),
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("session backend timed out after {0:?}")]
    Timeout(Duration),
}

/// Server-side session state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub fingerprint: Option<DeviceFingerprint>,
    pub trust_score: f64,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fingerprint: None,
            trust_score: NEUTRAL_TRUST,
            user_id: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Key-value session storage keyed by the hashed session token.
///
/// History is a bounded, newest-first list of fingerprints per principal.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Session>, StoreError>;

    async fn save(&self, key: &str, session: &Session, ttl: Duration) -> Result<(), StoreError>;

    async fn destroy(&self, key: &str) -> Result<(), StoreError>;

    async fn history(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>, StoreError>;

    async fn push_history(
        &self,
        user_id: &str,
        fingerprint: &DeviceFingerprint,
        limit: usize,
    ) -> Result<(), StoreError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
