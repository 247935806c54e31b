// Color resolution - normalises configured colors and derives translucent variants
use crate::domain::module::ColorValue;

/// Fallback palette, picked by series index
const PALETTE: &[&str] = &[
    "#36a2eb", // Blue
    "#ff6384", // Red
    "#4bc0c0", // Teal
    "#ffcd56", // Yellow
    "#9966ff", // Purple
    "#ff9f40", // Orange
    "#c9cbcf", // Gray
    "#64b5f6", // Light Blue
];

pub fn palette_color(index: usize) -> String {
    PALETTE[index % PALETTE.len()].to_string()
}

/// Renderable CSS color for a configured value, falling back to the palette
pub fn resolve(color: Option<&ColorValue>, index: usize) -> String {
    match color {
        Some(ColorValue::Css(css)) => {
            let css = css.trim();
            if css.is_empty() {
                palette_color(index)
            } else if css.starts_with("--") {
                format!("var({})", css)
            } else {
                css.to_string()
            }
        }
        Some(ColorValue::Channels(channels)) => match channels.as_slice() {
            [r, g, b] => format!("rgb({}, {}, {})", channel(*r), channel(*g), channel(*b)),
            [r, g, b, a] => format!(
                "rgba({}, {}, {}, {})",
                channel(*r),
                channel(*g),
                channel(*b),
                a.clamp(0.0, 1.0)
            ),
            _ => palette_color(index),
        },
        None => palette_color(index),
    }
}

fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().take(3).flat_map(|c| [c, c]).collect(),
        6 | 8 => hex[..6].to_string(),
        _ => return None,
    };
    let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
    let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
    let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
    Some((r, g, b))
}

fn parse_rgb_function(css: &str) -> Option<(u8, u8, u8)> {
    let open = css.find('(')?;
    let close = css.rfind(')')?;
    let parts: Vec<f64> = css[open + 1..close]
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .take(3)
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some((channel(*r), channel(*g), channel(*b))),
        _ => None,
    }
}

/// Same color at the given opacity
pub fn with_alpha(color: &str, alpha: f64) -> String {
    let alpha = alpha.clamp(0.0, 1.0);
    let color = color.trim();

    let rgb = if color.starts_with('#') {
        parse_hex(color)
    } else if color.starts_with("rgb") {
        parse_rgb_function(color)
    } else {
        None
    };

    match rgb {
        Some((r, g, b)) => format!("rgba({}, {}, {}, {})", r, g, b, alpha),
        // css variables and named colors are mixed by the host
        None => format!(
            "color-mix(in srgb, {} {}%, transparent)",
            color,
            (alpha * 100.0).round()
        ),
    }
}
