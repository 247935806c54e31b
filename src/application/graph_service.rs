// Graph service - Use case for mounting graph modules and producing what the host paints
use crate::application::chart_renderer::ChartRenderer;
use crate::application::data_source_loader::{DataSourceLoader, ModuleSnapshot};
use crate::application::formatting::{format_value, raw_value};
use crate::application::tooltip::{ContainerSize, TooltipContent, TooltipController};
use crate::domain::dashboard::{HeaderValue, ModuleBody, Placeholder, RenderedModule};
use crate::domain::drawing::{DrawingInstructions, HoverTarget};
use crate::domain::error::{GraphError, GraphResult};
use crate::domain::module::{DataSource, MAX_BUCKETS, ModuleConfig};
use crate::domain::telemetry::{Dataset, TimeSeriesResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct GraphService {
    loader: Arc<DataSourceLoader>,
    renderer: ChartRenderer,
    tooltips: Arc<TooltipController>,
}

/// Dataset whose current value goes in the module header
pub fn primary_dataset<'a>(config: &ModuleConfig, result: &'a TimeSeriesResult) -> Option<&'a Dataset> {
    let marked = config
        .series
        .iter()
        .position(|s| s.is_primary)
        .and_then(|index| result.datasets.iter().find(|d| d.series_index == index));
    marked.or_else(|| result.datasets.iter().find(|d| !d.values.is_empty()))
}

fn header_for(config: &ModuleConfig, result: &TimeSeriesResult) -> Option<HeaderValue> {
    let dataset = primary_dataset(config, result)?;
    let current = dataset.current_value();
    let value = format_value(current, &dataset.unit, config.options.decimals)
        .unwrap_or_else(|_| raw_value(current, &dataset.unit));
    Some(HeaderValue {
        name: dataset.name.clone(),
        value,
    })
}

fn validate(config: &ModuleConfig) -> GraphResult<()> {
    if config.id.trim().is_empty() {
        return Err(GraphError::Config("module id must not be empty".to_string()));
    }
    if config.data_source == DataSource::Forecast && config.forecast.is_none() {
        return Err(GraphError::Config(format!(
            "module {} uses forecast data but names no forecast source",
            config.id
        )));
    }
    match config.bucket_count {
        Some(0) => return Err(GraphError::Config(format!("module {} asks for zero buckets", config.id))),
        Some(n) if n > MAX_BUCKETS => {
            return Err(GraphError::Config(format!(
                "module {} asks for {} buckets, at most {} are supported",
                config.id, n, MAX_BUCKETS
            )));
        }
        _ => {}
    }
    Ok(())
}

impl GraphService {
    pub fn new(loader: Arc<DataSourceLoader>, tooltips: Arc<TooltipController>) -> Self {
        Self {
            loader,
            renderer: ChartRenderer::new(),
            tooltips,
        }
    }

    /// Mount a module, or apply a changed configuration to a mounted one
    pub fn configure(&self, config: ModuleConfig) -> GraphResult<()> {
        validate(&config)?;
        tracing::info!("Configuring module {} ({} sources)", config.id, config.series.len());
        self.loader.mount_and_spawn(config);
        Ok(())
    }

    pub fn remove(&self, module_id: &str) -> bool {
        self.tooltips.forget(module_id);
        self.loader.unmount(module_id)
    }

    pub fn module(&self, module_id: &str) -> Option<ModuleSnapshot> {
        self.loader.snapshot(module_id)
    }

    pub fn modules(&self) -> Vec<ModuleSnapshot> {
        self.loader
            .module_ids()
            .iter()
            .filter_map(|id| self.loader.snapshot(id))
            .collect()
    }

    /// Schedule a refetch for every idle module; returns how many were scheduled
    pub fn refresh_all(&self) -> usize {
        let mut scheduled = 0;
        for module_id in self.loader.module_ids() {
            if let Some(ticket) = self.loader.refresh(&module_id) {
                self.loader.spawn_fetch(ticket);
                scheduled += 1;
            }
        }
        scheduled
    }

    pub fn render(&self, module_id: &str) -> Option<RenderedModule> {
        let snapshot = self.loader.snapshot(module_id)?;
        Some(self.render_snapshot(snapshot))
    }

    fn render_snapshot(&self, snapshot: ModuleSnapshot) -> RenderedModule {
        let ModuleSnapshot {
            config,
            phase,
            state,
            result,
        } = snapshot;

        if config.series.is_empty() {
            return RenderedModule::placeholder(config.id, config.title, phase, Placeholder::NoEntities);
        }

        match result {
            Some(result) if !result.is_empty() => {
                let instructions = self.draw(&config, &result);
                RenderedModule {
                    header: header_for(&config, &result),
                    module_id: config.id,
                    title: config.title,
                    phase,
                    body: ModuleBody::Chart(instructions),
                }
            }
            _ if state.has_scheduled_fetch || state.is_loading => {
                RenderedModule::placeholder(config.id, config.title, phase, Placeholder::Loading)
            }
            _ => RenderedModule::placeholder(config.id, config.title, phase, Placeholder::NoData),
        }
    }

    fn draw(&self, config: &ModuleConfig, result: &TimeSeriesResult) -> DrawingInstructions {
        let mut instructions = self.renderer.render(config.chart_type, &result.datasets, &config.options);
        instructions.degraded = result.degraded;
        instructions
    }

    /// Drawing instructions of a module that currently has data
    pub fn instructions(&self, module_id: &str) -> Option<DrawingInstructions> {
        let snapshot = self.loader.snapshot(module_id)?;
        let result = snapshot.result.filter(|r| !r.is_empty())?;
        Some(self.draw(&snapshot.config, &result))
    }

    pub fn hover(&self, module_id: &str, target: HoverTarget, container: ContainerSize) -> Option<TooltipContent> {
        let snapshot = self.loader.snapshot(module_id)?;
        let result = snapshot.result.filter(|r| !r.is_empty())?;
        let instructions = self.draw(&snapshot.config, &result);
        self.tooltips.hover(
            module_id,
            &result,
            &instructions,
            target,
            container,
            snapshot.config.options.decimals,
        )
    }

    pub fn leave(&self, module_id: &str) {
        self.tooltips.leave(module_id);
    }
}
