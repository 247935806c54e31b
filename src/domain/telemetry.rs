// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One historical state change of a source, normalised from either history transport
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub state: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl HistorySample {
    pub fn new(timestamp: DateTime<Utc>, state: impl Into<String>) -> Self {
        Self {
            timestamp,
            state: state.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Current value of a source as exposed by the live state provider
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState {
    pub state: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl LiveState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn unit(&self) -> Option<String> {
        self.attributes
            .get("unit_of_measurement")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Provenance of a resolved payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    FastPath,
    History,
    Forecast,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
    pub unit: String,
    pub line_width: f64,
    pub line_style: crate::domain::module::LineStyle,
    pub show_points: bool,
    pub fill_area: bool,
    pub source_id: String,
    /// Position of the configured series this dataset was built from
    #[serde(default)]
    pub series_index: usize,
}

impl Dataset {
    /// Value shown for "now": the last bucket
    pub fn current_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    pub time_points: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub min: f64,
    pub max: f64,
    pub origin: Origin,
    pub last_updated: DateTime<Utc>,
    /// Set when history failed and each series was rebuilt from its current value only
    #[serde(default)]
    pub degraded: bool,
}

impl TimeSeriesResult {
    pub fn new(
        time_points: Vec<String>,
        datasets: Vec<Dataset>,
        origin: Origin,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let (min, max) = value_bounds(&datasets);
        Self {
            time_points,
            datasets,
            min,
            max,
            origin,
            last_updated,
            degraded: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() || self.time_points.is_empty()
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

/// Global min/max across every dataset, (0, 0) when there are no values
pub fn value_bounds(datasets: &[Dataset]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in datasets.iter().flat_map(|d| d.values.iter()) {
        min = min.min(*value);
        max = max.max(*value);
    }
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 0.0)
    }
}

/// Fixed vocabulary of forecast attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAttribute {
    Temperature,
    Precipitation,
    WindSpeed,
    Humidity,
    Pressure,
    CloudCoverage,
}

impl ForecastAttribute {
    pub const ALL: [ForecastAttribute; 6] = [
        ForecastAttribute::Temperature,
        ForecastAttribute::Precipitation,
        ForecastAttribute::WindSpeed,
        ForecastAttribute::Humidity,
        ForecastAttribute::Pressure,
        ForecastAttribute::CloudCoverage,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ForecastAttribute::Temperature => "temperature",
            ForecastAttribute::Precipitation => "precipitation",
            ForecastAttribute::WindSpeed => "wind_speed",
            ForecastAttribute::Humidity => "humidity",
            ForecastAttribute::Pressure => "pressure",
            ForecastAttribute::CloudCoverage => "cloud_coverage",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }

    /// Attribute on the weather entity carrying this value's unit
    pub fn unit_attribute(&self) -> Option<&'static str> {
        match self {
            ForecastAttribute::Temperature => Some("temperature_unit"),
            ForecastAttribute::Precipitation => Some("precipitation_unit"),
            ForecastAttribute::WindSpeed => Some("wind_speed_unit"),
            ForecastAttribute::Pressure => Some("pressure_unit"),
            ForecastAttribute::Humidity | ForecastAttribute::CloudCoverage => None,
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            ForecastAttribute::Temperature => "°C",
            ForecastAttribute::Precipitation => "mm",
            ForecastAttribute::WindSpeed => "km/h",
            ForecastAttribute::Humidity => "%",
            ForecastAttribute::Pressure => "hPa",
            ForecastAttribute::CloudCoverage => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    pub datetime: DateTime<Utc>,
    pub values: HashMap<ForecastAttribute, f64>,
}
