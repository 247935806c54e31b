// Home Assistant REST repository implementation
use crate::application::history_repository::{ForecastRepository, HistoryRepository};
use crate::domain::error::GraphError;
use crate::domain::module::ForecastCadence;
use crate::domain::telemetry::{ForecastAttribute, ForecastEntry, HistorySample, LiveState};
use crate::infrastructure::config::{HomeAssistantSettings, prepare_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const HISTORY_PATH: &str =
    "/api/history/period/${start}?filter_entity_id=${entities}&end_time=${end}&significant_changes_only=0";
const FORECAST_PATH: &str = "/api/services/weather/get_forecasts?return_response";
const STATES_PATH: &str = "/api/states";

#[derive(Debug, Deserialize)]
struct StateRow {
    #[serde(default)]
    entity_id: Option<String>,
    state: String,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
    #[serde(default)]
    last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct HomeAssistantRest {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Group `/api/history/period` rows by entity.
///
/// Each inner array belongs to one entity; only its first row is guaranteed
/// to carry the entity id. Malformed rows are dropped on their own.
pub fn parse_history_response(body: Value) -> Result<HashMap<String, Vec<HistorySample>>, GraphError> {
    let groups: Vec<Vec<Value>> = serde_json::from_value(body)?;
    let mut history = HashMap::new();

    for group in groups {
        let mut entity_id: Option<String> = None;
        let mut samples = Vec::with_capacity(group.len());
        for raw in group {
            let row: StateRow = match serde_json::from_value(raw) {
                Ok(row) => row,
                Err(e) => {
                    tracing::debug!("Dropping malformed history row: {}", e);
                    continue;
                }
            };
            if entity_id.is_none() {
                entity_id = row.entity_id.clone();
            }
            // attribute-only updates keep last_changed, so last_updated orders them
            let Some(timestamp) = row.last_updated.or(row.last_changed) else {
                tracing::debug!("Dropping history row without a timestamp");
                continue;
            };
            samples.push(HistorySample::new(timestamp, row.state).with_attributes(row.attributes));
        }
        match entity_id {
            Some(entity_id) => {
                samples.sort_by_key(|s| s.timestamp);
                history.insert(entity_id, samples);
            }
            None => tracing::debug!("Dropping history group without an entity id"),
        }
    }

    Ok(history)
}

/// Forecast rows of one entity from a `weather.get_forecasts` service response
pub fn parse_forecast_response(body: &Value, source_id: &str) -> Result<Vec<ForecastEntry>, GraphError> {
    let rows = body
        .get("service_response")
        .unwrap_or(body)
        .get(source_id)
        .and_then(|entity| entity.get("forecast"))
        .and_then(|forecast| forecast.as_array())
        .ok_or_else(|| GraphError::ParseFailure(format!("no forecast for {} in response", source_id)))?;

    let mut entries: Vec<ForecastEntry> = rows
        .iter()
        .filter_map(|row| {
            let datetime = row
                .get("datetime")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
                .with_timezone(&Utc);
            let values = ForecastAttribute::ALL
                .into_iter()
                .filter_map(|attribute| {
                    let value = row.get(attribute.key())?.as_f64()?;
                    Some((attribute, value))
                })
                .collect();
            Some(ForecastEntry { datetime, values })
        })
        .collect();
    entries.sort_by_key(|e| e.datetime);
    Ok(entries)
}

pub fn parse_states(body: Value) -> Result<HashMap<String, LiveState>, GraphError> {
    let rows: Vec<Value> = serde_json::from_value(body)?;
    Ok(rows
        .into_iter()
        .filter_map(|raw| {
            let row: StateRow = serde_json::from_value(raw).ok()?;
            let entity_id = row.entity_id?;
            Some((
                entity_id,
                LiveState {
                    state: row.state,
                    attributes: row.attributes,
                },
            ))
        })
        .collect())
}

impl HomeAssistantRest {
    pub fn new(settings: &HomeAssistantSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            client,
        })
    }

    fn history_url(&self, source_ids: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let mut vars = HashMap::new();
        vars.insert("start".to_string(), urlencoding::encode(&iso(start)).into_owned());
        vars.insert("end".to_string(), urlencoding::encode(&iso(end)).into_owned());
        vars.insert("entities".to_string(), urlencoding::encode(&source_ids.join(",")).into_owned());
        format!("{}{}", self.base_url, prepare_query(HISTORY_PATH, &vars))
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Home Assistant {} request failed with status {}: {}", what, status, body);
        }
        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse Home Assistant {} response", what))
    }

    /// Current state of every entity
    pub async fn fetch_states(&self) -> Result<HashMap<String, LiveState>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, STATES_PATH))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to send states request to Home Assistant")?;
        let body = Self::check(response, "states").await?;
        Ok(parse_states(body)?)
    }
}

#[async_trait]
impl HistoryRepository for HomeAssistantRest {
    async fn fetch_history(
        &self,
        source_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<HistorySample>>> {
        let url = self.history_url(source_ids, start, end);
        tracing::debug!("Querying REST history for {} sources", source_ids.len());

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to send history request to Home Assistant")?;
        let body = Self::check(response, "history").await?;
        Ok(parse_history_response(body)?)
    }
}

#[async_trait]
impl ForecastRepository for HomeAssistantRest {
    async fn fetch_forecast(&self, source_id: &str, cadence: ForecastCadence) -> Result<Vec<ForecastEntry>> {
        let payload = serde_json::json!({
            "entity_id": source_id,
            "type": cadence.as_str(),
        });
        let response = self
            .client
            .post(format!("{}{}", self.base_url, FORECAST_PATH))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .context("Failed to send forecast request to Home Assistant")?;
        let body = Self::check(response, "forecast").await?;
        Ok(parse_forecast_response(&body, source_id)?)
    }
}
