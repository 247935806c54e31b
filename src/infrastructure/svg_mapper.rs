// Mapper to convert drawing instructions to an SVG document
use crate::domain::drawing::{DrawingInstructions, HoverTarget, PathCommand, Primitive, TextAnchor};
use std::fmt::Write;

pub fn instructions_to_svg(instructions: &DrawingInstructions, title: Option<&str>) -> String {
    let mut svg = String::new();
    let class = if instructions.degraded { " class=\"degraded\"" } else { "" };
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {} {}\" preserveAspectRatio=\"none\"{}>",
        num(instructions.width),
        num(instructions.height),
        class
    );
    if let Some(title) = title {
        let _ = write!(svg, "<title>{}</title>", escape(title));
    }

    for primitive in &instructions.primitives {
        primitive_to_svg(&mut svg, primitive);
    }

    if !instructions.legend.is_empty() {
        svg.push_str("<metadata>");
        for entry in &instructions.legend {
            let _ = write!(
                svg,
                "<legend-entry name=\"{}\" color=\"{}\" value=\"{}\"/>",
                escape(&entry.name),
                escape(&entry.color),
                escape(&entry.value)
            );
        }
        svg.push_str("</metadata>");
    }

    svg.push_str("</svg>");
    svg
}

fn primitive_to_svg(svg: &mut String, primitive: &Primitive) {
    match primitive {
        Primitive::Path {
            commands,
            stroke,
            fill,
            stroke_width,
            dash,
            hover,
        } => {
            let _ = write!(
                svg,
                "<path d=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"",
                path_data(commands),
                escape(fill.as_deref().unwrap_or("none")),
                escape(stroke.as_deref().unwrap_or("none")),
                num(*stroke_width)
            );
            if let Some(dash) = dash {
                let _ = write!(svg, " stroke-dasharray=\"{}\"", escape(dash));
            }
            if stroke.is_some() && fill.is_none() {
                svg.push_str(" stroke-linecap=\"round\" stroke-linejoin=\"round\"");
            }
            hover_attributes(svg, *hover);
            svg.push_str("/>");
        }
        Primitive::Circle {
            center,
            radius,
            fill,
            hover,
        } => {
            let _ = write!(
                svg,
                "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"",
                num(center.x),
                num(center.y),
                num(*radius),
                escape(fill)
            );
            hover_attributes(svg, *hover);
            svg.push_str("/>");
        }
        Primitive::Line {
            from,
            to,
            stroke,
            stroke_width,
        } => {
            let _ = write!(
                svg,
                "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
                num(from.x),
                num(from.y),
                num(to.x),
                num(to.y),
                escape(stroke),
                num(*stroke_width)
            );
        }
        Primitive::Rect {
            origin,
            width,
            height,
            fill,
            hover,
        } => {
            let _ = write!(
                svg,
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"",
                num(origin.x),
                num(origin.y),
                num(*width),
                num(*height),
                escape(fill)
            );
            hover_attributes(svg, *hover);
            svg.push_str("/>");
        }
        Primitive::Text {
            at,
            content,
            anchor,
            size,
            fill,
        } => {
            let anchor = match anchor {
                TextAnchor::Start => "start",
                TextAnchor::Middle => "middle",
                TextAnchor::End => "end",
            };
            let _ = write!(
                svg,
                "<text x=\"{}\" y=\"{}\" text-anchor=\"{}\" dominant-baseline=\"middle\" font-size=\"{}\" fill=\"{}\">{}</text>",
                num(at.x),
                num(at.y),
                anchor,
                num(*size),
                escape(fill),
                escape(content)
            );
        }
    }
}

fn hover_attributes(svg: &mut String, hover: Option<HoverTarget>) {
    if let Some(target) = hover {
        let _ = write!(
            svg,
            " data-dataset=\"{}\" data-point=\"{}\"",
            target.dataset, target.point
        );
    }
}

/// SVG path data; the sweep flag is 1 for clockwise arcs since y grows downwards
pub fn path_data(commands: &[PathCommand]) -> String {
    let parts: Vec<String> = commands
        .iter()
        .map(|command| match command {
            PathCommand::MoveTo { to } => format!("M{} {}", num(to.x), num(to.y)),
            PathCommand::LineTo { to } => format!("L{} {}", num(to.x), num(to.y)),
            PathCommand::CubicTo { c1, c2, to } => format!(
                "C{} {} {} {} {} {}",
                num(c1.x),
                num(c1.y),
                num(c2.x),
                num(c2.y),
                num(to.x),
                num(to.y)
            ),
            PathCommand::ArcTo {
                radius,
                large_arc,
                clockwise,
                to,
            } => format!(
                "A{r} {r} 0 {} {} {} {}",
                u8::from(*large_arc),
                u8::from(*clockwise),
                num(to.x),
                num(to.y),
                r = num(*radius)
            ),
            PathCommand::Close => "Z".to_string(),
        })
        .collect();
    parts.join(" ")
}

/// Up to three decimals without trailing zeros
fn num(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
