// Test doubles shared by the application tests
use crate::application::history_repository::{
    Clock, ForecastRepository, HistoryRepository, KeyValueStore, LiveStateProvider, RenderRequester,
};
use crate::application::tooltip::{TooltipContent, TooltipPosition, TooltipSink};
use crate::domain::module::{ForecastCadence, LineStyle, ModuleId};
use crate::domain::telemetry::{Dataset, ForecastEntry, HistorySample, LiveState, Origin, TimeSeriesResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use crate::infrastructure::store::MemoryStore;

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at_hour(hour: u32) -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("storage disabled")
    }

    fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("quota exceeded")
    }
}

pub fn dataset(name: &str, values: Vec<f64>) -> Dataset {
    Dataset {
        name: name.to_string(),
        color: "#3b82f6".to_string(),
        values,
        unit: String::new(),
        line_width: 2.0,
        line_style: LineStyle::Solid,
        show_points: false,
        fill_area: false,
        source_id: format!("sensor.{}", name.to_lowercase()),
        series_index: 0,
    }
}

pub fn sample_result(now: DateTime<Utc>) -> TimeSeriesResult {
    TimeSeriesResult::new(
        vec!["11:00".to_string(), "12:00".to_string()],
        vec![dataset("Temperature", vec![20.5, 21.0])],
        Origin::History,
        now,
    )
}

#[derive(Default)]
pub struct FakeHistory {
    samples: Mutex<HashMap<String, Vec<HistorySample>>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeHistory {
    pub fn set(&self, source_id: &str, samples: Vec<HistorySample>) {
        self.samples.lock().unwrap().insert(source_id.to_string(), samples);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryRepository for FakeHistory {
    async fn fetch_history(
        &self,
        source_ids: &[String],
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> anyhow::Result<HashMap<String, Vec<HistorySample>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        let samples = self.samples.lock().unwrap();
        Ok(source_ids
            .iter()
            .filter_map(|id| samples.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeForecast {
    entries: Mutex<Vec<ForecastEntry>>,
}

impl FakeForecast {
    pub fn set(&self, entries: Vec<ForecastEntry>) {
        *self.entries.lock().unwrap() = entries;
    }
}

#[async_trait]
impl ForecastRepository for FakeForecast {
    async fn fetch_forecast(&self, _source_id: &str, _cadence: ForecastCadence) -> anyhow::Result<Vec<ForecastEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeLiveStates(Mutex<HashMap<String, LiveState>>);

impl FakeLiveStates {
    pub fn set(&self, source_id: &str, state: &str, unit: &str) {
        let mut live = LiveState::new(state);
        if !unit.is_empty() {
            live.attributes
                .insert("unit_of_measurement".to_string(), serde_json::Value::from(unit));
        }
        self.0.lock().unwrap().insert(source_id.to_string(), live);
    }

    pub fn set_attributes(&self, source_id: &str, state: &str, attributes: &[(&str, &str)]) {
        let mut live = LiveState::new(state);
        for (key, value) in attributes {
            live.attributes.insert(key.to_string(), serde_json::Value::from(*value));
        }
        self.0.lock().unwrap().insert(source_id.to_string(), live);
    }
}

impl LiveStateProvider for FakeLiveStates {
    fn state(&self, source_id: &str) -> Option<LiveState> {
        self.0.lock().unwrap().get(source_id).cloned()
    }
}

#[derive(Default)]
pub struct RecordingRenderRequester(Mutex<Vec<String>>);

impl RecordingRenderRequester {
    pub fn requests(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl RenderRequester for RecordingRenderRequester {
    fn request_render(&self, module_id: &ModuleId) {
        self.0.lock().unwrap().push(module_id.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TooltipCall {
    Create(String),
    Show(String, TooltipPosition, TooltipContent),
    Hide(String),
    Remove(String),
}

#[derive(Default)]
pub struct RecordingTooltipSink(Mutex<Vec<TooltipCall>>);

impl RecordingTooltipSink {
    pub fn calls(&self) -> Vec<TooltipCall> {
        self.0.lock().unwrap().clone()
    }
}

impl TooltipSink for RecordingTooltipSink {
    fn create(&self, module_id: &str) {
        self.0.lock().unwrap().push(TooltipCall::Create(module_id.to_string()));
    }

    fn show(&self, module_id: &str, position: TooltipPosition, content: &TooltipContent) {
        self.0
            .lock()
            .unwrap()
            .push(TooltipCall::Show(module_id.to_string(), position, content.clone()));
    }

    fn hide(&self, module_id: &str) {
        self.0.lock().unwrap().push(TooltipCall::Hide(module_id.to_string()));
    }

    fn remove(&self, module_id: &str) {
        self.0.lock().unwrap().push(TooltipCall::Remove(module_id.to_string()));
    }
}
