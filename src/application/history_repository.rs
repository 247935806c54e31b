// Repository traits for everything the engine reads from or writes to the outside
use crate::domain::module::{ForecastCadence, ModuleId};
use crate::domain::telemetry::{ForecastEntry, HistorySample, LiveState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Query raw samples for every source over `[start, end]`, keyed by source id
    async fn fetch_history(
        &self,
        source_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<HashMap<String, Vec<HistorySample>>>;
}

#[async_trait]
pub trait ForecastRepository: Send + Sync {
    /// Ordered forecast entries for a weather source at the given cadence
    async fn fetch_forecast(
        &self,
        source_id: &str,
        cadence: ForecastCadence,
    ) -> anyhow::Result<Vec<ForecastEntry>>;
}

/// Synchronous read-only view of the current state of every source
pub trait LiveStateProvider: Send + Sync {
    fn state(&self, source_id: &str) -> Option<LiveState>;
}

/// Persistence for the history cache blob
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Asks the host to paint a module again
pub trait RenderRequester: Send + Sync {
    fn request_render(&self, module_id: &ModuleId);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
