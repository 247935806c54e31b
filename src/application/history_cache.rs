// History cache - resolved payloads persisted under one storage key with a fixed TTL
use crate::application::history_repository::{Clock, KeyValueStore};
use crate::domain::error::GraphError;
use crate::domain::telemetry::TimeSeriesResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage key holding the whole cache blob
pub const CACHE_STORAGE_KEY: &str = "dashboard-graphs.history-cache";

pub const CACHE_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub expires_at: DateTime<Utc>,
    pub payload: TimeSeriesResult,
}

#[derive(Default)]
struct CacheState {
    /// `None` until the persisted blob has been read
    entries: Option<HashMap<String, CacheEntry>>,
    memory_only: bool,
}

pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cached payload for a fingerprint, evicting it when expired
    pub fn read(&self, fingerprint: &str) -> Option<TimeSeriesResult> {
        let now = self.clock.now();
        let mut state = self.lock();
        self.ensure_loaded(&mut state);

        let entries = state.entries.get_or_insert_with(HashMap::new);
        let expires_at = entries.get(fingerprint)?.expires_at;
        if now >= expires_at {
            tracing::debug!("Cache entry {} expired at {}, evicting", fingerprint, expires_at);
            self.merge_persisted(&mut state);
            let entries = state.entries.get_or_insert_with(HashMap::new);
            // another writer may have refreshed the entry since we loaded it
            if let Some(entry) = entries.get(fingerprint).filter(|e| now < e.expires_at) {
                return Some(entry.payload.clone());
            }
            entries.remove(fingerprint);
            self.persist(&mut state);
            return None;
        }

        tracing::debug!("Cache hit for {}", fingerprint);
        state
            .entries
            .as_ref()
            .and_then(|e| e.get(fingerprint))
            .map(|entry| entry.payload.clone())
    }

    pub fn write(&self, fingerprint: &str, payload: TimeSeriesResult) {
        let now = self.clock.now();
        let mut state = self.lock();
        self.ensure_loaded(&mut state);

        self.merge_persisted(&mut state);

        let entries = state.entries.get_or_insert_with(HashMap::new);
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                expires_at: now + self.ttl,
                payload,
            },
        );
        self.persist(&mut state);
    }

    /// Whether persistence has been given up for this session
    pub fn is_memory_only(&self) -> bool {
        self.lock().memory_only
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold in entries another writer sharing the store saved since we loaded
    fn merge_persisted(&self, state: &mut CacheState) {
        if state.memory_only {
            return;
        }
        let Some(persisted) = self.load_persisted(state) else {
            return;
        };
        let entries = state.entries.get_or_insert_with(HashMap::new);
        for (key, entry) in persisted {
            let newer = entries
                .get(&key)
                .map(|current| entry.expires_at > current.expires_at)
                .unwrap_or(true);
            if newer {
                entries.insert(key, entry);
            }
        }
    }

    fn ensure_loaded(&self, state: &mut CacheState) {
        if state.entries.is_some() {
            return;
        }
        let entries = self.load_persisted(state).unwrap_or_default();
        tracing::debug!("Loaded {} persisted history cache entries", entries.len());
        state.entries = Some(entries);
    }

    fn load_persisted(&self, state: &mut CacheState) -> Option<HashMap<String, CacheEntry>> {
        match self.store.get(CACHE_STORAGE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&blob) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    tracing::warn!("Discarding unreadable history cache blob: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                let err = GraphError::StorageFailure(format!("{:#}", e));
                tracing::warn!("History cache storage unavailable, using memory only: {}", err);
                state.memory_only = true;
                None
            }
        }
    }

    fn persist(&self, state: &mut CacheState) {
        if state.memory_only {
            return;
        }
        let Some(entries) = state.entries.as_ref() else {
            return;
        };
        let result = serde_json::to_string(entries)
            .map_err(anyhow::Error::from)
            .and_then(|blob| self.store.set(CACHE_STORAGE_KEY, &blob));
        if let Err(e) = result {
            let err = GraphError::StorageFailure(format!("{:#}", e));
            tracing::warn!("Persisting history cache failed, using memory only: {}", err);
            state.memory_only = true;
        }
    }
}
