// Tooltip controller - one floating tooltip per module, moved on every hover
use crate::application::formatting::{format_value, raw_value};
use crate::domain::drawing::{DrawingInstructions, HoverTarget, Point};
use crate::domain::telemetry::TimeSeriesResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Pixels between the hovered point and the tooltip edge
const POINT_OFFSET: f64 = 10.0;
/// Below this distance from the top the tooltip flips under the point
const FLIP_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipPosition {
    pub left: f64,
    pub top: f64,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipContent {
    pub series: String,
    pub time_label: String,
    pub value: String,
}

/// Pixel size of the element the chart is drawn into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

/// Rendering surface for the floating tooltip
pub trait TooltipSink: Send + Sync {
    /// Create the tooltip element of a module; called once per module
    fn create(&self, module_id: &str);
    fn show(&self, module_id: &str, position: TooltipPosition, content: &TooltipContent);
    fn hide(&self, module_id: &str);
    /// Drop the tooltip element of a module that is gone
    fn remove(&self, module_id: &str);
}

/// Tooltip text for a data point, using the original (not normalised) value
pub fn tooltip_content(result: &TimeSeriesResult, target: HoverTarget, decimals: usize) -> Option<TooltipContent> {
    let dataset = result.datasets.get(target.dataset)?;
    let value = *dataset.values.get(target.point)?;
    let time_label = result.time_points.get(target.point).cloned().unwrap_or_default();
    let value = match format_value(value, &dataset.unit, decimals) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Tooltip formatting failed, showing raw value: {}", e);
            raw_value(value, &dataset.unit)
        }
    };
    Some(TooltipContent {
        series: dataset.name.clone(),
        time_label,
        value,
    })
}

/// Map a point in chart units onto the container, above the point unless too close to the top
pub fn tooltip_position(anchor: Point, view: (f64, f64), container: ContainerSize) -> TooltipPosition {
    let (view_width, view_height) = view;
    let x = if view_width > 0.0 { anchor.x / view_width * container.width } else { 0.0 };
    let y = if view_height > 0.0 { anchor.y / view_height * container.height } else { 0.0 };

    let (top, placement) = if y < FLIP_THRESHOLD {
        (y + POINT_OFFSET, Placement::Below)
    } else {
        (y - POINT_OFFSET, Placement::Above)
    };
    TooltipPosition {
        left: x.clamp(0.0, container.width.max(0.0)),
        top,
        placement,
    }
}

pub struct TooltipController {
    sink: Arc<dyn TooltipSink>,
    created: Mutex<HashSet<String>>,
}

impl TooltipController {
    pub fn new(sink: Arc<dyn TooltipSink>) -> Self {
        Self {
            sink,
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Show the tooltip of a hovered point; returns what was shown
    pub fn hover(
        &self,
        module_id: &str,
        result: &TimeSeriesResult,
        instructions: &DrawingInstructions,
        target: HoverTarget,
        container: ContainerSize,
        decimals: usize,
    ) -> Option<TooltipContent> {
        let anchor = instructions.hover_anchor(target)?;
        let content = tooltip_content(result, target, decimals)?;
        let position = tooltip_position(anchor, (instructions.width, instructions.height), container);

        let first_hover = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(module_id.to_string());
        if first_hover {
            self.sink.create(module_id);
        }
        self.sink.show(module_id, position, &content);
        Some(content)
    }

    pub fn leave(&self, module_id: &str) {
        let created = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(module_id);
        if created {
            self.sink.hide(module_id);
        }
    }

    /// Drop the tooltip of an unmounted module
    pub fn forget(&self, module_id: &str) {
        let removed = self
            .created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(module_id);
        if removed {
            self.sink.remove(module_id);
        }
    }
}
