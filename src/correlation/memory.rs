use super::{CorrelationStore, StoreError};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    callback_url: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process correlation store for single-instance deployments.
///
/// Records do not survive a restart and are not shared between replicas.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CorrelationStore for MemoryStore {
    async fn put(
        &self,
        session_id: &str,
        callback_url: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        // Sweep on write so abandoned handshakes do not accumulate.
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            session_id.to_string(),
            Entry {
                callback_url: callback_url.to_string(),
                expires_at: now + ttl,
            },
        );

        debug!(session_id, ttl_secs = ttl.as_secs(), "correlation record stored");
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;

        Ok(entries
            .get(session_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.callback_url.clone()))
    }

    async fn take(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        Ok(entries
            .remove(session_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.callback_url))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
