// Home Assistant WebSocket history client
use crate::application::history_repository::HistoryRepository;
use crate::domain::error::GraphError;
use crate::domain::telemetry::HistorySample;
use crate::infrastructure::config::HomeAssistantSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HISTORY_REQUEST_ID: u64 = 1;

#[derive(Debug, Clone)]
pub struct HomeAssistantWebSocket {
    ws_url: String,
    token: String,
    timeout: Duration,
}

/// `http(s)://host` to `ws(s)://host/api/websocket`
pub fn websocket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/api/websocket", base)
}

fn epoch_seconds(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = value.as_f64()?;
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}

/// Samples from the compressed `{entity: [{s, a, lu}]}` history shape.
///
/// Rows without a readable state or timestamp are dropped on their own.
pub fn parse_compressed_history(result: &Value) -> Result<HashMap<String, Vec<HistorySample>>, GraphError> {
    let entities = result
        .as_object()
        .ok_or_else(|| GraphError::ParseFailure("history result is not an object".to_string()))?;

    let mut history = HashMap::with_capacity(entities.len());
    for (entity_id, rows) in entities {
        let Some(rows) = rows.as_array() else {
            tracing::debug!("Dropping history of {}, rows are not a list", entity_id);
            continue;
        };
        let mut samples: Vec<HistorySample> = rows
            .iter()
            .filter_map(|row| {
                let state = row.get("s")?.as_str()?;
                let timestamp = row.get("lu").or_else(|| row.get("lc")).and_then(epoch_seconds)?;
                let attributes = row
                    .get("a")
                    .and_then(|a| a.as_object())
                    .cloned()
                    .unwrap_or_default();
                Some(HistorySample::new(timestamp, state).with_attributes(attributes))
            })
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        history.insert(entity_id.clone(), samples);
    }
    Ok(history)
}

pub fn history_request(source_ids: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> Value {
    json!({
        "id": HISTORY_REQUEST_ID,
        "type": "history/history_during_period",
        "start_time": start.to_rfc3339_opts(SecondsFormat::Secs, true),
        "end_time": end.to_rfc3339_opts(SecondsFormat::Secs, true),
        "entity_ids": source_ids,
        "minimal_response": false,
        "no_attributes": false,
        "significant_changes_only": false,
    })
}

impl HomeAssistantWebSocket {
    pub fn new(settings: &HomeAssistantSettings) -> Self {
        Self {
            ws_url: websocket_url(&settings.base_url),
            token: settings.token.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    async fn next_json(socket: &mut Socket) -> Result<Value> {
        while let Some(message) = socket.next().await {
            match message.context("WebSocket read failed")? {
                Message::Text(text) => {
                    return serde_json::from_str(&text).context("Invalid JSON from Home Assistant");
                }
                Message::Close(frame) => anyhow::bail!("WebSocket closed by Home Assistant: {:?}", frame),
                _ => continue,
            }
        }
        anyhow::bail!("WebSocket stream ended")
    }

    async fn send_json(socket: &mut Socket, value: &Value) -> Result<()> {
        socket
            .send(Message::Text(value.to_string()))
            .await
            .context("WebSocket send failed")
    }

    async fn authenticate(&self, socket: &mut Socket) -> Result<()> {
        let greeting = Self::next_json(socket).await?;
        if greeting["type"] != "auth_required" {
            anyhow::bail!("Unexpected greeting from Home Assistant: {}", greeting);
        }
        Self::send_json(socket, &json!({"type": "auth", "access_token": self.token})).await?;

        let reply = Self::next_json(socket).await?;
        match reply["type"].as_str() {
            Some("auth_ok") => Ok(()),
            _ => anyhow::bail!("Home Assistant rejected the access token: {}", reply),
        }
    }

    async fn query(&self, source_ids: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Value> {
        let (mut socket, _) = connect_async(self.ws_url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.ws_url))?;
        self.authenticate(&mut socket).await?;
        Self::send_json(&mut socket, &history_request(source_ids, start, end)).await?;

        let result = loop {
            let message = Self::next_json(&mut socket).await?;
            if message["id"] != HISTORY_REQUEST_ID || message["type"] != "result" {
                continue;
            }
            if message["success"] != true {
                anyhow::bail!("History request failed: {}", message["error"]);
            }
            break message["result"].clone();
        };

        if let Err(e) = socket.close(None).await {
            tracing::debug!("Closing history WebSocket failed: {}", e);
        }
        Ok(result)
    }
}

#[async_trait]
impl HistoryRepository for HomeAssistantWebSocket {
    async fn fetch_history(
        &self,
        source_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<HistorySample>>> {
        let result = tokio::time::timeout(self.timeout, self.query(source_ids, start, end))
            .await
            .context("WebSocket history request timed out")??;
        Ok(parse_compressed_history(&result)?)
    }
}
