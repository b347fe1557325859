//! Redis-backed session store for multi-instance deployments.
//!
//! Keys:
//! - `guardian:session:<token-hash>`: JSON session, `SETEX` with the session TTL.
//! - `guardian:history:<user-id>`: list of JSON fingerprints, newest first,
//!   trimmed to the configured limit.

use ::redis::{AsyncCommands, Client, aio::ConnectionManager};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Instrument, info, info_span, warn};

use super::{Session, SessionStore, StoreError};
use crate::fingerprint::DeviceFingerprint;

const KEY_PREFIX: &str = "guardian";

#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    command_timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to Redis and verify the connection with `PING`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &SecretString, command_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url.expose_secret())?;
        let connection = timeout(command_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(command_timeout))??;

        let store = Self {
            connection,
            command_timeout,
        };
        store.ping().await?;

        info!("Redis session store connected");

        Ok(store)
    }

    fn session_key(key: &str) -> String {
        format!("{KEY_PREFIX}:session:{key}")
    }

    fn history_key(user_id: &str) -> String {
        format!("{KEY_PREFIX}:history:{user_id}")
    }

    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, ::redis::RedisError>>,
    {
        let span = info_span!("redis.command", db.system = "redis", db.operation = operation);
        match timeout(self.command_timeout, future.instrument(span)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!("Redis {operation} failed: {err}");
                Err(StoreError::Backend(err))
            }
            Err(_) => {
                warn!("Redis {operation} timed out");
                Err(StoreError::Timeout(self.command_timeout))
            }
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = self
            .bounded("GET", conn.get(Self::session_key(key)))
            .await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(&self, key: &str, session: &Session, ttl: Duration) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let mut conn = self.connection.clone();
        // SETEX rejects a zero TTL.
        let seconds = ttl.as_secs().max(1);
        self.bounded::<(), _>("SETEX", conn.set_ex(Self::session_key(key), json, seconds))
            .await
    }

    async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        self.bounded::<(), _>("DEL", conn.del(Self::session_key(key)))
            .await
    }

    async fn history(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = self
            .bounded("LRANGE", conn.lrange(Self::history_key(user_id), 0, -1))
            .await?;
        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    async fn push_history(
        &self,
        user_id: &str,
        fingerprint: &DeviceFingerprint,
        limit: usize,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(fingerprint)?;
        let key = Self::history_key(user_id);
        let stop = isize::try_from(limit).unwrap_or(isize::MAX).saturating_sub(1);

        let mut pipe = ::redis::pipe();
        pipe.atomic()
            .lpush(&key, json)
            .ignore()
            .ltrim(&key, 0, stop)
            .ignore();

        let mut conn = self.connection.clone();
        self.bounded::<(), _>("LPUSH", pipe.query_async(&mut conn))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let pong: String = self
            .bounded("PING", ::redis::cmd("PING").query_async(&mut conn))
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            warn!("Unexpected PING reply: {pong}");
            Err(StoreError::Backend(::redis::RedisError::from((
                ::redis::ErrorKind::ResponseError,
                "unexpected PING reply",
            ))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            RedisSessionStore::session_key("abc"),
            "guardian:session:abc"
        );
        assert_eq!(
            RedisSessionStore::history_key("user-1"),
            "guardian:history:user-1"
        );
    }
}
