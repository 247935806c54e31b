// Data source loader - picks fast path, cached replay or a deferred fetch for each module
use crate::application::aligner::{align, bucket_labels, reading, sample_value};
use crate::application::color::resolve;
use crate::application::history_cache::HistoryCache;
use crate::application::history_repository::{
    Clock, ForecastRepository, HistoryRepository, LiveStateProvider, RenderRequester,
};
use crate::application::synthetic::synthetic_trend;
use crate::domain::error::{GraphError, GraphResult};
use crate::domain::load_state::{LoadPhase, ModuleLoadState};
use crate::domain::module::{DataSource, ForecastCadence, ModuleConfig, ModuleId, SeriesConfig, TimePeriod};
use crate::domain::telemetry::{Dataset, ForecastAttribute, HistorySample, LiveState, Origin, TimeSeriesResult};
use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Level of the synthetic preview trend for sources with no value at all
const PREVIEW_BASE: f64 = 20.0;

/// Identifies one deferred fetch; its response is only committed while the
/// module still has the same generation and fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub module_id: ModuleId,
    pub generation: u64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleSnapshot {
    pub config: ModuleConfig,
    pub phase: LoadPhase,
    pub state: ModuleLoadState,
    pub result: Option<TimeSeriesResult>,
}

struct ModuleSlot {
    config: ModuleConfig,
    fingerprint: String,
    generation: u64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    time_points: Vec<String>,
    phase: LoadPhase,
    state: ModuleLoadState,
    result: Option<TimeSeriesResult>,
}

impl ModuleSlot {
    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            config: self.config.clone(),
            phase: self.phase,
            state: self.state.clone(),
            result: self.result.clone(),
        }
    }
}

/// `[now - period, now]`
pub fn lookback_window(now: DateTime<Utc>, period: TimePeriod) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::hours(period.hours()), now)
}

fn forecast_label(datetime: DateTime<Utc>, cadence: ForecastCadence) -> String {
    let local = datetime.with_timezone(&Local);
    match cadence {
        ForecastCadence::Hourly => local.format("%H:%M").to_string(),
        ForecastCadence::Daily => local.format("%a %d/%m").to_string(),
    }
}

/// Current numeric value of a source, honouring the attribute path
fn live_value(state: &LiveState, attribute_path: Option<&str>) -> Option<f64> {
    reading(&state.state, &state.attributes, attribute_path)
}

fn build_dataset(series: &SeriesConfig, index: usize, values: Vec<f64>, unit: String, friendly_name: Option<&str>) -> Dataset {
    let name = match (&series.display_name, friendly_name) {
        (Some(name), _) if !name.trim().is_empty() => name.clone(),
        (_, Some(friendly)) if series.attribute_path.is_none() => friendly.to_string(),
        _ => series.name(),
    };
    Dataset {
        name,
        color: resolve(series.color.as_ref(), index),
        values,
        unit,
        line_width: series.line_width,
        line_style: series.line_style,
        show_points: series.show_points,
        fill_area: series.fill_area,
        source_id: series.source_id.clone(),
        series_index: index,
    }
}

pub struct DataSourceLoader {
    history: Arc<dyn HistoryRepository>,
    forecast: Arc<dyn ForecastRepository>,
    live: Arc<dyn LiveStateProvider>,
    cache: Arc<HistoryCache>,
    render: Arc<dyn RenderRequester>,
    clock: Arc<dyn Clock>,
    modules: Mutex<HashMap<ModuleId, ModuleSlot>>,
    generations: AtomicU64,
}

impl DataSourceLoader {
    pub fn new(
        history: Arc<dyn HistoryRepository>,
        forecast: Arc<dyn ForecastRepository>,
        live: Arc<dyn LiveStateProvider>,
        cache: Arc<HistoryCache>,
        render: Arc<dyn RenderRequester>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            history,
            forecast,
            live,
            cache,
            render,
            clock,
            modules: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModuleId, ModuleSlot>> {
        self.modules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mount a module or apply a new configuration to it.
    ///
    /// Always leaves something paintable behind (cached payload, fast path or
    /// nothing for a placeholder) and returns the deferred fetch to run, if any.
    pub fn mount(&self, config: ModuleConfig) -> Option<FetchTicket> {
        let fingerprint = config.fingerprint();
        let mut modules = self.lock();

        if let Some(slot) = modules.get_mut(&config.id) {
            if slot.fingerprint == fingerprint {
                // display-only change, the data stays valid
                slot.config = config;
                return None;
            }
            tracing::info!("Configuration of module {} changed, clearing its load state", config.id);
        }

        let now = self.clock.now();
        let (window_start, window_end) = lookback_window(now, config.period);
        let buckets = config.buckets();
        let mut slot = ModuleSlot {
            time_points: bucket_labels(window_start, window_end, buckets),
            fingerprint: fingerprint.clone(),
            generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
            window_start,
            window_end,
            phase: LoadPhase::Idle,
            state: ModuleLoadState::default(),
            result: None,
            config,
        };
        let module_id = slot.config.id.clone();

        if slot.config.series.is_empty() {
            tracing::debug!("Module {} has no sources configured", module_id);
            modules.insert(module_id, slot);
            return None;
        }

        if let Some(cached) = self.cache.read(&fingerprint) {
            tracing::debug!("Module {} served from cache", module_id);
            slot.result = Some(cached.with_origin(Origin::Cache));
            slot.phase = LoadPhase::Ready;
            modules.insert(module_id, slot);
            return None;
        }

        if slot.config.data_source == DataSource::History {
            if let Some(fast) = self.fast_path(&slot.config, &slot.time_points, now) {
                slot.result = Some(fast);
                slot.phase = LoadPhase::FastPath;
            }
        }

        slot.state.has_scheduled_fetch = true;
        let ticket = FetchTicket {
            module_id: module_id.clone(),
            generation: slot.generation,
            fingerprint,
        };
        modules.insert(module_id, slot);
        tracing::debug!("Scheduled fetch for module {} (generation {})", ticket.module_id, ticket.generation);
        Some(ticket)
    }

    /// Schedule a new fetch over a fresh window, unless one is already outstanding.
    /// A module served from the cache stays as is until its entry expires.
    pub fn refresh(&self, module_id: &str) -> Option<FetchTicket> {
        let mut modules = self.lock();
        let slot = modules.get_mut(module_id)?;
        if slot.state.has_scheduled_fetch || slot.state.is_loading || slot.config.series.is_empty() {
            return None;
        }
        let from_cache = slot.result.as_ref().is_some_and(|r| r.origin == Origin::Cache);
        if from_cache && self.cache.read(&slot.fingerprint).is_some() {
            return None;
        }

        let (window_start, window_end) = lookback_window(self.clock.now(), slot.config.period);
        slot.window_start = window_start;
        slot.window_end = window_end;
        slot.time_points = bucket_labels(window_start, window_end, slot.config.buckets());
        slot.state.has_scheduled_fetch = true;
        Some(FetchTicket {
            module_id: module_id.to_string(),
            generation: slot.generation,
            fingerprint: slot.fingerprint.clone(),
        })
    }

    pub fn unmount(&self, module_id: &str) -> bool {
        self.lock().remove(module_id).is_some()
    }

    pub fn snapshot(&self, module_id: &str) -> Option<ModuleSnapshot> {
        self.lock().get(module_id).map(|slot| slot.snapshot())
    }

    pub fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run a deferred fetch on the runtime
    pub fn spawn_fetch(self: &Arc<Self>, ticket: FetchTicket) -> JoinHandle<()> {
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.fetch(ticket).await })
    }

    pub fn mount_and_spawn(self: &Arc<Self>, config: ModuleConfig) -> Option<JoinHandle<()>> {
        self.mount(config).map(|ticket| self.spawn_fetch(ticket))
    }

    /// Perform the fetch behind a ticket and commit it if the module still wants it
    pub async fn fetch(&self, ticket: FetchTicket) {
        let job = {
            let mut modules = self.lock();
            match modules.get_mut(&ticket.module_id) {
                Some(slot) if slot.generation == ticket.generation => {
                    slot.state.is_loading = true;
                    slot.phase = LoadPhase::Loading;
                    Some((slot.config.clone(), slot.window_start, slot.window_end, slot.time_points.clone()))
                }
                _ => None,
            }
        };
        let Some((config, start, end, time_points)) = job else {
            tracing::debug!("Skipping fetch for module {}, it changed before the fetch ran", ticket.module_id);
            return;
        };

        let outcome = match config.data_source {
            DataSource::History => self.fetch_history(&config, start, end, time_points).await,
            DataSource::Forecast => self.fetch_forecast(&config).await,
        };
        self.commit(&ticket, outcome);
    }

    fn commit(&self, ticket: &FetchTicket, outcome: GraphResult<TimeSeriesResult>) {
        {
            let mut modules = self.lock();
            let Some(slot) = modules.get_mut(&ticket.module_id) else {
                tracing::debug!("Module {} was unmounted, dropping fetch result", ticket.module_id);
                return;
            };
            if slot.generation != ticket.generation || slot.fingerprint != ticket.fingerprint {
                tracing::debug!(
                    "Discarding stale response for module {} (generation {} != {})",
                    ticket.module_id,
                    ticket.generation,
                    slot.generation
                );
                return;
            }

            slot.state.is_loading = false;
            slot.state.has_scheduled_fetch = false;
            match outcome {
                Ok(result) => {
                    if !result.degraded {
                        self.cache.write(&ticket.fingerprint, result.clone());
                    }
                    slot.result = Some(result);
                    slot.phase = LoadPhase::Ready;
                    slot.state.last_error = None;
                }
                Err(GraphError::NoData(reason)) => {
                    tracing::info!("Module {} has nothing to show: {}", ticket.module_id, reason);
                    // the seeded preview stands in for missing data when enabled
                    if !slot.config.options.preview_fallback {
                        slot.result = None;
                    }
                    slot.phase = LoadPhase::Ready;
                    slot.state.last_error = None;
                }
                Err(e) => {
                    if e.is_fetch_related() {
                        tracing::warn!("Fetch for module {} failed: {}", ticket.module_id, e);
                    } else {
                        tracing::error!("Module {} cannot be loaded: {}", ticket.module_id, e);
                    }
                    // whatever was painted before stays on screen
                    slot.state.last_error = Some(e.to_string());
                    slot.phase = LoadPhase::Error;
                }
            }
        }
        self.render.request_render(&ticket.module_id);
    }

    /// Flat line at each source's current value
    fn fast_path(&self, config: &ModuleConfig, time_points: &[String], now: DateTime<Utc>) -> Option<TimeSeriesResult> {
        let buckets = time_points.len();
        let datasets: Vec<Dataset> = config
            .series
            .iter()
            .enumerate()
            .filter_map(|(index, series)| {
                let live = self.live.state(&series.source_id);
                let value = live
                    .as_ref()
                    .and_then(|state| live_value(state, series.attribute_path.as_deref()));
                let values = match value {
                    Some(value) => vec![value; buckets],
                    None if config.options.preview_fallback => {
                        synthetic_trend(&series.source_id, buckets, PREVIEW_BASE)
                    }
                    None => return None,
                };
                let unit = live.as_ref().and_then(|s| s.unit()).unwrap_or_default();
                let friendly = live
                    .as_ref()
                    .and_then(|s| s.attributes.get("friendly_name"))
                    .and_then(|v| v.as_str());
                Some(build_dataset(series, index, values, unit, friendly))
            })
            .collect();

        if datasets.is_empty() {
            return None;
        }
        Some(TimeSeriesResult::new(time_points.to_vec(), datasets, Origin::FastPath, now))
    }

    async fn fetch_history(
        &self,
        config: &ModuleConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        time_points: Vec<String>,
    ) -> GraphResult<TimeSeriesResult> {
        let mut source_ids: Vec<String> = Vec::new();
        for series in &config.series {
            if !source_ids.contains(&series.source_id) {
                source_ids.push(series.source_id.clone());
            }
        }

        let (history, degraded) = match self.history.fetch_history(&source_ids, start, end).await {
            Ok(history) => (history, false),
            Err(e) => {
                tracing::warn!(
                    "History query for module {} failed, using current values instead: {:#}",
                    config.id,
                    e
                );
                let fallback = self.current_value_history(&source_ids, end);
                if fallback.is_empty() {
                    return Err(GraphError::FetchFailure(format!("{:#}", e)));
                }
                (fallback, true)
            }
        };

        let buckets = time_points.len();
        let mut datasets = Vec::new();
        for (index, series) in config.series.iter().enumerate() {
            let attribute_path = series.attribute_path.as_deref();
            let live = self.live.state(&series.source_id);
            let mut samples: Vec<HistorySample> = history.get(&series.source_id).cloned().unwrap_or_default();

            let has_reading = samples
                .iter()
                .any(|s| sample_value(s, attribute_path).is_some());
            if !has_reading {
                // a source that did not change inside the window still has a current value
                match live.as_ref().filter(|s| live_value(s, attribute_path).is_some()) {
                    Some(state) => samples.push(
                        HistorySample::new(end, state.state.clone()).with_attributes(state.attributes.clone()),
                    ),
                    None => {
                        tracing::debug!("No readings for {} in module {}", series.source_id, config.id);
                        continue;
                    }
                }
            }

            let values = align(&samples, buckets, start, end, attribute_path);
            let unit = live
                .as_ref()
                .and_then(|s| s.unit())
                .or_else(|| {
                    samples
                        .iter()
                        .rev()
                        .find_map(|s| s.attributes.get("unit_of_measurement").and_then(|u| u.as_str()))
                        .map(|u| u.to_string())
                })
                .unwrap_or_default();
            let friendly = live
                .as_ref()
                .and_then(|s| s.attributes.get("friendly_name"))
                .and_then(|v| v.as_str());
            datasets.push(build_dataset(series, index, values, unit, friendly));
        }

        if datasets.is_empty() {
            return Err(GraphError::NoData(format!("no samples for module {}", config.id)));
        }

        let mut result = TimeSeriesResult::new(time_points, datasets, Origin::History, self.clock.now());
        result.degraded = degraded;
        Ok(result)
    }

    /// One sample per source taken from its current value
    fn current_value_history(&self, source_ids: &[String], at: DateTime<Utc>) -> HashMap<String, Vec<HistorySample>> {
        source_ids
            .iter()
            .filter_map(|source_id| {
                let state = self.live.state(source_id)?;
                let sample = HistorySample::new(at, state.state).with_attributes(state.attributes);
                Some((source_id.clone(), vec![sample]))
            })
            .collect()
    }

    async fn fetch_forecast(&self, config: &ModuleConfig) -> GraphResult<TimeSeriesResult> {
        let settings = config
            .forecast
            .as_ref()
            .ok_or_else(|| GraphError::Config(format!("module {} has no forecast source", config.id)))?;

        let mut entries = self
            .forecast
            .fetch_forecast(&settings.source_id, settings.cadence)
            .await
            .map_err(|e| GraphError::FetchFailure(format!("{:#}", e)))?;
        entries.sort_by_key(|e| e.datetime);
        if let Some(max_points) = settings.max_points {
            entries.truncate(max_points);
        }
        if entries.is_empty() {
            return Err(GraphError::NoData(format!("empty forecast from {}", settings.source_id)));
        }

        let provider = self.live.state(&settings.source_id);
        let time_points: Vec<String> = entries
            .iter()
            .map(|e| forecast_label(e.datetime, settings.cadence))
            .collect();

        let mut datasets = Vec::new();
        for (index, series) in config.series.iter().enumerate() {
            let Some(attribute) = ForecastAttribute::from_key(&series.source_id) else {
                tracing::warn!("Unknown forecast attribute '{}' in module {}", series.source_id, config.id);
                continue;
            };
            // entries missing the attribute hold the previous value
            let mut last = None;
            let values: Vec<f64> = entries
                .iter()
                .map(|entry| {
                    if let Some(value) = entry.values.get(&attribute) {
                        last = Some(*value);
                    }
                    last.unwrap_or(0.0)
                })
                .collect();
            if last.is_none() {
                continue;
            }

            let unit = attribute
                .unit_attribute()
                .and_then(|key| provider.as_ref()?.attributes.get(key)?.as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| attribute.default_unit().to_string());
            datasets.push(build_dataset(series, index, values, unit, None));
        }

        if datasets.is_empty() {
            return Err(GraphError::NoData(format!(
                "forecast from {} has none of the configured attributes",
                settings.source_id
            )));
        }
        Ok(TimeSeriesResult::new(time_points, datasets, Origin::Forecast, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::history_cache::CacheEntry;
    use crate::application::history_cache::CACHE_STORAGE_KEY;
    use crate::application::history_repository::KeyValueStore;
    use crate::application::testing::{
        FakeForecast, FakeHistory, FakeLiveStates, FixedClock, MemoryStore, RecordingRenderRequester,
    };
    use crate::domain::module::ForecastSettings;
    use chrono::TimeZone;
    use std::collections::HashMap as Map;

    struct Harness {
        loader: Arc<DataSourceLoader>,
        history: Arc<FakeHistory>,
        forecast: Arc<FakeForecast>,
        live: Arc<FakeLiveStates>,
        store: Arc<MemoryStore>,
        render: Arc<RecordingRenderRequester>,
        clock: Arc<FixedClock>,
    }

    fn harness() -> Harness {
        let history = Arc::new(FakeHistory::default());
        let forecast = Arc::new(FakeForecast::default());
        let live = Arc::new(FakeLiveStates::default());
        let store = Arc::new(MemoryStore::default());
        let render = Arc::new(RecordingRenderRequester::default());
        let clock = Arc::new(FixedClock::at_hour(12));
        let cache = Arc::new(HistoryCache::new(store.clone(), clock.clone()));
        let loader = Arc::new(DataSourceLoader::new(
            history.clone(),
            forecast.clone(),
            live.clone(),
            cache,
            render.clone(),
            clock.clone(),
        ));
        Harness {
            loader,
            history,
            forecast,
            live,
            store,
            render,
            clock,
        }
    }

    fn module(sources: &[&str]) -> ModuleConfig {
        let mut config = ModuleConfig::new("graphs-1", sources.iter().map(|s| SeriesConfig::new(*s)).collect());
        config.period = TimePeriod::OneDay;
        config.bucket_count = Some(24);
        config
    }

    #[tokio::test]
    async fn test_fast_path_then_history() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        let now = h.clock.now();
        h.history.set(
            "sensor.temp",
            vec![
                HistorySample::new(now - Duration::hours(20), "18"),
                HistorySample::new(now - Duration::hours(2), "22"),
            ],
        );

        let ticket = h.loader.mount(module(&["sensor.temp"])).unwrap();
        let first = h.loader.snapshot("graphs-1").unwrap();
        let fast = first.result.unwrap();
        assert_eq!(first.phase, LoadPhase::FastPath);
        assert!(first.state.has_scheduled_fetch);
        assert_eq!(fast.origin, Origin::FastPath);
        assert_eq!(fast.datasets[0].values, vec![42.0; 24]);
        assert_eq!(fast.datasets[0].unit, "°C");

        h.loader.fetch(ticket).await;
        let loaded = h.loader.snapshot("graphs-1").unwrap();
        let result = loaded.result.unwrap();
        assert_eq!(loaded.phase, LoadPhase::Ready);
        assert!(!loaded.state.is_loading);
        assert_eq!(result.origin, Origin::History);
        assert_eq!(result.time_points, fast.time_points);
        assert_eq!(result.datasets[0].values.len(), 24);
        assert_eq!(*result.datasets[0].values.last().unwrap(), 22.0);
        assert_eq!(h.render.requests(), vec!["graphs-1".to_string()]);
        assert!(h.store.get(CACHE_STORAGE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mount_uses_cache_and_schedules_nothing() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        h.history.set("sensor.temp", vec![HistorySample::new(h.clock.now(), "20")]);

        let ticket = h.loader.mount(module(&["sensor.temp"])).unwrap();
        h.loader.fetch(ticket).await;
        h.loader.unmount("graphs-1");

        assert!(h.loader.mount(module(&["sensor.temp"])).is_none());
        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        assert_eq!(snapshot.phase, LoadPhase::Ready);
        assert_eq!(snapshot.result.unwrap().origin, Origin::Cache);
        assert_eq!(h.history.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_module_is_not_refreshed_before_expiry() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        h.history.set("sensor.temp", vec![HistorySample::new(h.clock.now(), "20")]);

        let ticket = h.loader.mount(module(&["sensor.temp"])).unwrap();
        h.loader.fetch(ticket).await;
        h.loader.unmount("graphs-1");
        assert!(h.loader.mount(module(&["sensor.temp"])).is_none());

        h.clock.advance(Duration::minutes(3));
        assert!(h.loader.refresh("graphs-1").is_none());

        h.clock.advance(Duration::minutes(3));
        let ticket = h.loader.refresh("graphs-1").unwrap();
        h.loader.fetch(ticket).await;
        assert_eq!(h.history.calls(), 2);
        assert_eq!(h.loader.snapshot("graphs-1").unwrap().result.unwrap().origin, Origin::History);
    }

    #[tokio::test]
    async fn test_expired_cache_entry_schedules_fresh_fetch() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        let config = module(&["sensor.temp"]);
        let stale = TimeSeriesResult::new(vec![], vec![], Origin::History, h.clock.now());
        let mut entries = Map::new();
        entries.insert(
            config.fingerprint(),
            CacheEntry {
                expires_at: h.clock.now() - Duration::milliseconds(1),
                payload: stale,
            },
        );
        h.store
            .set(CACHE_STORAGE_KEY, &serde_json::to_string(&entries).unwrap())
            .unwrap();

        assert!(h.loader.mount(config).is_some());
        assert_eq!(h.loader.snapshot("graphs-1").unwrap().result.unwrap().origin, Origin::FastPath);
    }

    #[tokio::test]
    async fn test_history_failure_degrades_to_current_value() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        h.history.fail_with("connection refused");

        let ticket = h.loader.mount(module(&["sensor.temp"])).unwrap();
        h.loader.fetch(ticket).await;

        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        let result = snapshot.result.unwrap();
        assert_eq!(snapshot.phase, LoadPhase::Ready);
        assert!(result.degraded);
        assert_eq!(result.datasets[0].values, vec![42.0; 24]);
        // degraded data is never persisted
        assert!(h.store.get(CACHE_STORAGE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_render() {
        let h = harness();
        h.history.fail_with("timeout");
        let mut config = module(&["sensor.temp"]);
        config.options.preview_fallback = true;

        let ticket = h.loader.mount(config).unwrap();
        let before = h.loader.snapshot("graphs-1").unwrap().result.unwrap();
        h.loader.fetch(ticket).await;

        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        assert_eq!(snapshot.phase, LoadPhase::Error);
        assert!(snapshot.state.last_error.unwrap().contains("timeout"));
        assert_eq!(snapshot.result.unwrap(), before);
    }

    #[tokio::test]
    async fn test_single_fetch_per_configuration() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        let config = module(&["sensor.temp"]);

        assert!(h.loader.mount(config.clone()).is_some());
        assert!(h.loader.mount(config.clone()).is_none());
        assert!(h.loader.refresh("graphs-1").is_none());

        let mut restyled = config;
        restyled.options.smooth = false;
        assert!(h.loader.mount(restyled).is_none());
        assert!(!h.loader.snapshot("graphs-1").unwrap().config.options.smooth);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let h = harness();
        h.live.set("sensor.a", "1", "");
        h.live.set("sensor.b", "2", "");
        h.history.set("sensor.a", vec![HistorySample::new(h.clock.now(), "10")]);
        h.history.set("sensor.b", vec![HistorySample::new(h.clock.now(), "20")]);

        let old_ticket = h.loader.mount(module(&["sensor.a"])).unwrap();
        let new_ticket = h.loader.mount(module(&["sensor.b"])).unwrap();
        assert_ne!(old_ticket.generation, new_ticket.generation);

        // old response arrives after the reconfiguration
        h.loader.commit(
            &old_ticket,
            Ok(TimeSeriesResult::new(vec![], vec![], Origin::History, h.clock.now())),
        );
        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        assert_eq!(snapshot.result.as_ref().unwrap().origin, Origin::FastPath);
        assert_eq!(snapshot.result.unwrap().datasets[0].source_id, "sensor.b");
        assert!(h.render.requests().is_empty());

        h.loader.fetch(new_ticket).await;
        let result = h.loader.snapshot("graphs-1").unwrap().result.unwrap();
        assert_eq!(result.datasets[0].values, vec![20.0; 24]);
    }

    #[tokio::test]
    async fn test_empty_history_is_ready_without_error() {
        let h = harness();
        let ticket = h.loader.mount(module(&["sensor.outside"])).unwrap();
        h.loader.fetch(ticket).await;

        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        assert_eq!(snapshot.phase, LoadPhase::Ready);
        assert!(snapshot.state.last_error.is_none());
        assert!(!snapshot.state.has_scheduled_fetch);
        assert!(snapshot.result.is_none());
        assert_eq!(h.render.requests(), vec!["graphs-1".to_string()]);
    }

    #[tokio::test]
    async fn test_no_sources_schedules_nothing() {
        let h = harness();
        assert!(h.loader.mount(module(&[])).is_none());
        let snapshot = h.loader.snapshot("graphs-1").unwrap();
        assert_eq!(snapshot.phase, LoadPhase::Idle);
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn test_forecast_mode_builds_one_dataset_per_attribute() {
        let h = harness();
        let mut config = module(&["temperature", "humidity", "uv_index"]);
        config.data_source = DataSource::Forecast;
        config.forecast = Some(ForecastSettings {
            source_id: "weather.home".to_string(),
            cadence: ForecastCadence::Hourly,
            max_points: Some(3),
        });
        h.live.set_attributes("weather.home", "sunny", &[("temperature_unit", "°F")]);

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        h.forecast.set(
            (0..5)
                .map(|i| {
                    let mut values = Map::new();
                    values.insert(ForecastAttribute::Temperature, 60.0 + i as f64);
                    if i != 1 {
                        values.insert(ForecastAttribute::Humidity, 50.0 + i as f64);
                    }
                    crate::domain::telemetry::ForecastEntry {
                        datetime: start + Duration::hours(i),
                        values,
                    }
                })
                .collect(),
        );

        let ticket = h.loader.mount(config).unwrap();
        assert!(h.loader.snapshot("graphs-1").unwrap().result.is_none());
        h.loader.fetch(ticket).await;

        let result = h.loader.snapshot("graphs-1").unwrap().result.unwrap();
        assert_eq!(result.origin, Origin::Forecast);
        assert_eq!(result.time_points.len(), 3);
        assert_eq!(result.datasets.len(), 2);
        assert_eq!(result.datasets[0].values, vec![60.0, 61.0, 62.0]);
        assert_eq!(result.datasets[0].unit, "°F");
        assert_eq!(result.datasets[1].values, vec![50.0, 50.0, 52.0]);
        assert_eq!(result.datasets[1].unit, "%");
        assert_eq!(h.history.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_completion() {
        let h = harness();
        h.live.set("sensor.temp", "42", "°C");
        h.history.set("sensor.temp", vec![HistorySample::new(h.clock.now(), "20")]);

        let ticket = h.loader.mount(module(&["sensor.temp"])).unwrap();
        h.loader.spawn_fetch(ticket).await.unwrap();

        h.clock.advance(Duration::minutes(10));
        let refreshed = h.loader.refresh("graphs-1").unwrap();
        h.loader.fetch(refreshed).await;
        assert_eq!(h.history.calls(), 2);
        assert_eq!(h.render.requests().len(), 2);
    }
}
