// Graph module configuration - what a dashboard module asks the engine to show
use serde::{Deserialize, Serialize};

use super::error::GraphError;

pub type ModuleId = String;

/// Upper bound on buckets per chart
pub const MAX_BUCKETS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Area,
    Bar,
    Pie,
    Donut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    History,
    Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    /// Stroke dash pattern in chart units, `None` for a solid stroke
    pub fn dash_array(&self) -> Option<&'static str> {
        match self {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some("4 2"),
            LineStyle::Dotted => Some("1 2"),
        }
    }
}

/// Symbolic lookback window, written as `1h` … `365d` in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimePeriod {
    OneHour,
    ThreeHours,
    SixHours,
    TwelveHours,
    #[default]
    OneDay,
    TwoDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    OneYear,
}

impl TryFrom<String> for TimePeriod {
    type Error = GraphError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::from_code(&code)
    }
}

impl From<TimePeriod> for String {
    fn from(period: TimePeriod) -> Self {
        period.code().to_string()
    }
}

impl TimePeriod {
    pub fn hours(&self) -> i64 {
        match self {
            TimePeriod::OneHour => 1,
            TimePeriod::ThreeHours => 3,
            TimePeriod::SixHours => 6,
            TimePeriod::TwelveHours => 12,
            TimePeriod::OneDay => 24,
            TimePeriod::TwoDays => 48,
            TimePeriod::OneWeek => 168,
            TimePeriod::TwoWeeks => 336,
            TimePeriod::OneMonth => 720,
            TimePeriod::ThreeMonths => 2160,
            TimePeriod::OneYear => 8760,
        }
    }

    /// Bucket count used when the module does not pick one
    pub fn default_buckets(&self) -> usize {
        match self {
            TimePeriod::OneHour => 12,
            TimePeriod::ThreeHours => 18,
            TimePeriod::SixHours | TimePeriod::TwelveHours | TimePeriod::OneDay => 24,
            TimePeriod::TwoDays => 24,
            TimePeriod::OneWeek => 28,
            TimePeriod::TwoWeeks => 28,
            TimePeriod::OneMonth | TimePeriod::ThreeMonths => 30,
            TimePeriod::OneYear => 52,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TimePeriod::OneHour => "1h",
            TimePeriod::ThreeHours => "3h",
            TimePeriod::SixHours => "6h",
            TimePeriod::TwelveHours => "12h",
            TimePeriod::OneDay => "24h",
            TimePeriod::TwoDays => "48h",
            TimePeriod::OneWeek => "7d",
            TimePeriod::TwoWeeks => "14d",
            TimePeriod::OneMonth => "30d",
            TimePeriod::ThreeMonths => "90d",
            TimePeriod::OneYear => "365d",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, GraphError> {
        let period = match code.trim() {
            "1h" => TimePeriod::OneHour,
            "3h" => TimePeriod::ThreeHours,
            "6h" => TimePeriod::SixHours,
            "12h" => TimePeriod::TwelveHours,
            "24h" | "1d" => TimePeriod::OneDay,
            "48h" | "2d" => TimePeriod::TwoDays,
            "7d" => TimePeriod::OneWeek,
            "14d" => TimePeriod::TwoWeeks,
            "30d" => TimePeriod::OneMonth,
            "90d" => TimePeriod::ThreeMonths,
            "365d" => TimePeriod::OneYear,
            other => return Err(GraphError::Config(format!("unknown time period '{}'", other))),
        };
        Ok(period)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastCadence {
    #[default]
    Hourly,
    Daily,
}

impl ForecastCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastCadence::Hourly => "hourly",
            ForecastCadence::Daily => "daily",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Weather provider entity queried for forecasts
    pub source_id: String,
    #[serde(default)]
    pub cadence: ForecastCadence,
    /// Cap on the number of forecast points shown
    #[serde(default)]
    pub max_points: Option<usize>,
}

/// A color as written in module config: a CSS string or an `[r, g, b(, a)]` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Css(String),
    Channels(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Entity id, or the forecast attribute name in forecast mode
    pub source_id: String,
    #[serde(default)]
    pub attribute_path: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub color: Option<ColorValue>,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default)]
    pub show_points: bool,
    #[serde(default)]
    pub fill_area: bool,
    #[serde(default)]
    pub is_primary: bool,
}

fn default_line_width() -> f64 {
    2.0
}

impl SeriesConfig {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            attribute_path: None,
            display_name: None,
            color: None,
            line_width: default_line_width(),
            line_style: LineStyle::Solid,
            show_points: false,
            fill_area: false,
            is_primary: false,
        }
    }

    pub fn name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => match &self.attribute_path {
                Some(path) => format!("{} {}", self.source_id, path),
                None => self.source_id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SliceLabels {
    None,
    Name,
    Value,
    #[default]
    NameAndValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub smooth: bool,
    pub show_grid: bool,
    pub grid_lines: usize,
    pub normalize: bool,
    /// Fraction of the plot height kept free above the highest value
    pub headroom: f64,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub decimals: usize,
    pub show_legend: bool,
    /// Gap between pie/donut slices in chart units
    pub slice_gap: f64,
    pub slice_labels: SliceLabels,
    pub background_color: String,
    /// Draw a seeded synthetic trend for sources without a live value
    pub preview_fallback: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            smooth: true,
            show_grid: false,
            grid_lines: 4,
            normalize: false,
            headroom: 0.1,
            y_min: None,
            y_max: None,
            decimals: 1,
            show_legend: true,
            slice_gap: 0.0,
            slice_labels: SliceLabels::NameAndValue,
            background_color: "var(--card-background-color, #ffffff)".to_string(),
            preview_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub id: ModuleId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub period: TimePeriod,
    #[serde(default)]
    pub bucket_count: Option<usize>,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
    #[serde(default)]
    pub forecast: Option<ForecastSettings>,
    #[serde(default)]
    pub options: ChartOptions,
}

impl ModuleConfig {
    pub fn new(id: impl Into<String>, series: Vec<SeriesConfig>) -> Self {
        Self {
            id: id.into(),
            title: None,
            chart_type: ChartType::Line,
            data_source: DataSource::History,
            period: TimePeriod::OneDay,
            bucket_count: None,
            series,
            forecast: None,
            options: ChartOptions::default(),
        }
    }

    pub fn buckets(&self) -> usize {
        self.bucket_count
            .filter(|n| *n > 0)
            .unwrap_or_else(|| self.period.default_buckets())
            .min(MAX_BUCKETS)
    }

    /// Cache key derived from everything that determines the fetched data.
    /// Display-only options do not take part, so restyling a module keeps its data.
    pub fn fingerprint(&self) -> String {
        match (self.data_source, &self.forecast) {
            (DataSource::Forecast, Some(forecast)) => {
                let attributes: Vec<&str> = self.series.iter().map(|s| s.source_id.as_str()).collect();
                let mut key = format!(
                    "forecast|{}|{}|{}",
                    forecast.source_id,
                    forecast.cadence.as_str(),
                    attributes.join(",")
                );
                if let Some(max_points) = forecast.max_points {
                    key.push_str(&format!("|{}", max_points));
                }
                key
            }
            _ => {
                let sources: Vec<String> = self
                    .series
                    .iter()
                    .map(|s| match &s.attribute_path {
                        Some(path) => format!("{}:{}", s.source_id, path),
                        None => s.source_id.clone(),
                    })
                    .collect();
                format!("history|{}|{}|{}", sources.join(","), self.period.code(), self.buckets())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_hours() {
        assert_eq!(TimePeriod::OneHour.hours(), 1);
        assert_eq!(TimePeriod::OneWeek.hours(), 168);
        assert_eq!(TimePeriod::OneYear.hours(), 8760);
        assert_eq!(TimePeriod::from_code("30d").unwrap(), TimePeriod::OneMonth);
        assert!(TimePeriod::from_code("5m").is_err());
    }

    #[test]
    fn test_bucket_count_is_capped() {
        let mut config = ModuleConfig::new("m1", vec![SeriesConfig::new("sensor.temp")]);
        assert_eq!(config.buckets(), 24);
        config.bucket_count = Some(2_000_000_000);
        assert_eq!(config.buckets(), MAX_BUCKETS);
    }

    #[test]
    fn test_fingerprint_ignores_display_options() {
        let mut config = ModuleConfig::new("m1", vec![SeriesConfig::new("sensor.temp")]);
        let before = config.fingerprint();

        config.options.smooth = false;
        config.chart_type = ChartType::Area;
        assert_eq!(config.fingerprint(), before);

        config.series[0].attribute_path = Some("humidity".to_string());
        assert_ne!(config.fingerprint(), before);
    }

    #[test]
    fn test_fingerprint_forecast_mode() {
        let mut config = ModuleConfig::new("m1", vec![SeriesConfig::new("temperature")]);
        config.data_source = DataSource::Forecast;
        config.forecast = Some(ForecastSettings {
            source_id: "weather.home".to_string(),
            cadence: ForecastCadence::Daily,
            max_points: None,
        });
        assert_eq!(config.fingerprint(), "forecast|weather.home|daily|temperature");

        if let Some(forecast) = config.forecast.as_mut() {
            forecast.max_points = Some(5);
        }
        assert_eq!(config.fingerprint(), "forecast|weather.home|daily|temperature|5");
    }

    #[test]
    fn test_period_codes_in_config() {
        let config: ModuleConfig = serde_json::from_str(r#"{"id": "m1", "period": "1d"}"#).unwrap();
        assert_eq!(config.period, TimePeriod::OneDay);
        assert_eq!(serde_json::to_value(config.period).unwrap(), "24h");
        assert!(serde_json::from_str::<ModuleConfig>(r#"{"id": "m1", "period": "5m"}"#).is_err());
    }

    #[test]
    fn test_module_config_from_toml() {
        let config: ModuleConfig = toml::from_str(
            r##"
            id = "living"
            chart_type = "donut"
            period = "7d"

            [[series]]
            source_id = "sensor.power"
            color = "#ff0000"
            is_primary = true

            [[series]]
            source_id = "sensor.other"
            color = [10, 20, 30]

            [options]
            slice_gap = 1.5
            slice_labels = "value"
            "##,
        )
        .unwrap();

        assert_eq!(config.chart_type, ChartType::Donut);
        assert_eq!(config.period, TimePeriod::OneWeek);
        assert_eq!(config.buckets(), 28);
        assert_eq!(config.series[1].color, Some(ColorValue::Channels(vec![10.0, 20.0, 30.0])));
        assert_eq!(config.options.slice_labels, SliceLabels::Value);
        assert!(config.options.smooth);
    }
}
