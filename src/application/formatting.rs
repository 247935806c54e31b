// Value and label formatting shared by the renderer and the tooltip
use crate::domain::error::{GraphError, GraphResult};

const MAX_DECIMALS: usize = 6;

/// Formatted value with its unit, e.g. `21.5°C` or `340 W`
pub fn format_value(value: f64, unit: &str, decimals: usize) -> GraphResult<String> {
    if !value.is_finite() {
        return Err(GraphError::Format(format!("cannot format non-finite value {}", value)));
    }
    if decimals > MAX_DECIMALS {
        return Err(GraphError::Format(format!("{} decimals requested", decimals)));
    }
    let number = format!("{:.*}", decimals, value);
    // avoid "-0.0"
    let number = if number.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        number.trim_start_matches('-').to_string()
    } else {
        number
    };
    Ok(with_unit(&number, unit))
}

/// Unformatted fallback, `value+unit`
pub fn raw_value(value: f64, unit: &str) -> String {
    format!("{}{}", value, unit)
}

fn with_unit(number: &str, unit: &str) -> String {
    let unit = unit.trim();
    if unit.is_empty() {
        number.to_string()
    } else if unit.starts_with('%') || unit.starts_with('°') {
        format!("{}{}", number, unit)
    } else {
        format!("{} {}", number, unit)
    }
}

/// Shorten a label to `max_chars`, ending it with an ellipsis when cut
pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let kept: String = label.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value_units() {
        assert_eq!(format_value(21.456, "°C", 1).unwrap(), "21.5°C");
        assert_eq!(format_value(55.0, "%", 0).unwrap(), "55%");
        assert_eq!(format_value(340.0, "W", 0).unwrap(), "340 W");
        assert_eq!(format_value(-0.01, "", 1).unwrap(), "0.0");
        assert_eq!(format_value(3.0, "", 2).unwrap(), "3.00");
    }

    #[test]
    fn test_format_value_rejects_non_finite() {
        assert!(format_value(f64::NAN, "W", 1).is_err());
        assert!(format_value(1.0, "W", 12).is_err());
        assert_eq!(raw_value(f64::INFINITY, "W"), "infW");
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Kitchen", 10), "Kitchen");
        assert_eq!(truncate_label("Living room temperature", 8), "Living…");
    }
}
