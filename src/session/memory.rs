//! In-process session store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{Session, SessionStore, StoreError};
use crate::fingerprint::DeviceFingerprint;

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// Sessions expire lazily: an entry past its TTL is dropped when next read,
/// and every write sweeps all expired entries.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    histories: Mutex<HashMap<String, VecDeque<DeviceFingerprint>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.session.clone())),
            Some(_) => {
                sessions.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, session: &Session, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        // Abandoned tokens are never read again, so expiry cannot rely on load alone.
        sessions.retain(|_, entry| entry.expires_at > now);

        sessions.insert(
            key.to_string(),
            Entry {
                session: session.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(key);
        Ok(())
    }

    async fn history(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>, StoreError> {
        let histories = self.histories.lock().await;
        Ok(histories
            .get(user_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn push_history(
        &self,
        user_id: &str,
        fingerprint: &DeviceFingerprint,
        limit: usize,
    ) -> Result<(), StoreError> {
        let mut histories = self.histories.lock().await;
        let entries = histories.entry(user_id.to_string()).or_default();
        entries.push_front(fingerprint.clone());
        entries.truncate(limit);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
