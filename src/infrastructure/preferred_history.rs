// History transport selection - WebSocket first, REST when it fails
use crate::application::history_repository::HistoryRepository;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::telemetry::HistorySample;

pub struct PreferredHistory {
    preferred: Option<Arc<dyn HistoryRepository>>,
    fallback: Arc<dyn HistoryRepository>,
}

impl PreferredHistory {
    pub fn new(preferred: Option<Arc<dyn HistoryRepository>>, fallback: Arc<dyn HistoryRepository>) -> Self {
        Self { preferred, fallback }
    }
}

#[async_trait]
impl HistoryRepository for PreferredHistory {
    async fn fetch_history(
        &self,
        source_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<HistorySample>>> {
        if let Some(preferred) = &self.preferred {
            match preferred.fetch_history(source_ids, start, end).await {
                Ok(history) => return Ok(history),
                Err(e) => tracing::warn!("Preferred history transport failed, retrying over REST: {:#}", e),
            }
        }
        self.fallback.fetch_history(source_ids, start, end).await
    }
}
