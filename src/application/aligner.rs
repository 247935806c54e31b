// Time bucket alignment - turns irregular history into one value per bucket
use crate::domain::telemetry::HistorySample;
use chrono::{DateTime, Duration, Local, Utc};

/// States that mean "no reading" rather than a value
const SENTINEL_STATES: [&str; 5] = ["unavailable", "unknown", "none", "null", ""];

/// Read the numeric value of a sample, from its state or from an attribute path.
/// Returns `None` for sentinel states and anything that does not parse as a finite number.
pub fn sample_value(sample: &HistorySample, attribute_path: Option<&str>) -> Option<f64> {
    reading(&sample.state, &sample.attributes, attribute_path)
}

/// Numeric value of a state/attributes pair, following a dotted attribute path when given
pub fn reading(
    state: &str,
    attributes: &serde_json::Map<String, serde_json::Value>,
    attribute_path: Option<&str>,
) -> Option<f64> {
    match attribute_path.filter(|p| !p.is_empty()) {
        Some(path) => {
            let mut segments = path.split('.');
            let mut current = attributes.get(segments.next()?)?;
            for segment in segments {
                current = current.get(segment)?;
            }
            json_number(current)
        }
        None => parse_state(state),
    }
}

/// Numeric reading of a raw state string
pub fn parse_state(state: &str) -> Option<f64> {
    let trimmed = state.trim();
    if SENTINEL_STATES.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => parse_state(s),
        _ => None,
    }
}

/// Evenly spaced instants from `start` to `end`, both included.
/// A single bucket sits at `end`.
pub fn bucket_instants(start: DateTime<Utc>, end: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    match count {
        0 => Vec::new(),
        1 => vec![end],
        _ => {
            let span_ms = (end - start).num_milliseconds();
            let steps = (count - 1) as i64;
            (0..count as i64)
                .map(|i| start + Duration::milliseconds(span_ms * i / steps))
                .collect()
        }
    }
}

/// Human-readable labels for the buckets of a window; shared by every strategy
/// so a refreshed chart keeps the same axis.
pub fn bucket_labels(start: DateTime<Utc>, end: DateTime<Utc>, count: usize) -> Vec<String> {
    let span = end - start;
    let format = if span <= Duration::hours(24) {
        "%H:%M"
    } else if span <= Duration::days(7) {
        "%d/%m %H:%M"
    } else {
        "%d/%m"
    };
    bucket_instants(start, end, count)
        .into_iter()
        .map(|instant| instant.with_timezone(&Local).format(format).to_string())
        .collect()
}

/// Sample-and-hold alignment.
///
/// Each bucket takes the value of the latest sample at or before its instant.
/// A bucket earlier than every sample takes the latest sample overall, and with
/// no usable sample at all every bucket is 0. Values are never interpolated.
pub fn align(
    samples: &[HistorySample],
    bucket_count: usize,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    attribute_path: Option<&str>,
) -> Vec<f64> {
    let mut readings: Vec<(DateTime<Utc>, f64)> = samples
        .iter()
        .filter_map(|s| sample_value(s, attribute_path).map(|v| (s.timestamp, v)))
        .collect();
    readings.sort_by_key(|(timestamp, _)| *timestamp);

    let latest = readings.last().map(|(_, v)| *v);

    bucket_instants(window_start, window_end, bucket_count)
        .into_iter()
        .map(|instant| {
            let at_or_before = readings.partition_point(|(timestamp, _)| *timestamp <= instant);
            if at_or_before > 0 {
                readings[at_or_before - 1].1
            } else {
                latest.unwrap_or(0.0)
            }
        })
        .collect()
}
