// Chart renderer - drawing instructions for line, area, bar, pie and donut charts
use crate::application::color::with_alpha;
use crate::application::curve::{close_to_baseline, to_path};
use crate::application::formatting::{format_value, raw_value, truncate_label};
use crate::domain::drawing::{
    DrawingInstructions, HoverAnchor, HoverTarget, LegendEntry, PathCommand, Point, Primitive, TextAnchor,
};
use crate::domain::module::{ChartOptions, ChartType, SliceLabels};
use crate::domain::telemetry::Dataset;

/// Normalised coordinate space of line, area and bar charts
pub const CHART_WIDTH: f64 = 300.0;
pub const CHART_HEIGHT: f64 = 100.0;

/// Square coordinate space of pie and donut charts
pub const PIE_SIZE: f64 = 100.0;
const PIE_OUTER_RADIUS: f64 = 45.0;
const DONUT_INNER_RATIO: f64 = 0.72;
const MIN_LABEL_SPAN_DEGREES: f64 = 10.0;
const MAX_LABEL_RADIUS_RATIO: f64 = 0.85;

const BAR_LABEL_SPACE: f64 = 12.0;
const BAR_FILL_RATIO: f64 = 0.6;
const BAR_NAME_CHARS: usize = 12;

const AREA_ALPHA: f64 = 0.2;
const GRID_COLOR: &str = "rgba(127, 127, 127, 0.25)";
const LABEL_COLOR: &str = "var(--secondary-text-color, #727272)";
const SLICE_LABEL_COLOR: &str = "#ffffff";

/// Angular extent of one pie/donut slice, degrees clockwise from 12 o'clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGeometry {
    pub index: usize,
    pub value: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl SliceGeometry {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

/// Sweep angles proportional to each value over the total, in input order.
/// Negative values count as zero; an all-zero input has no slices.
pub fn compute_slices(values: &[f64]) -> Vec<SliceGeometry> {
    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }

    let mut start = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let value = value.max(0.0);
            let end = start + value / total * 360.0;
            let slice = SliceGeometry {
                index,
                value,
                start_angle: start,
                end_angle: end,
            };
            start = end;
            slice
        })
        .collect()
}

/// Rescale to 0–100 using the series' own min and max.
/// A constant series maps to 50 everywhere.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![50.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range * 100.0).collect()
}

/// Values as plotted; the datasets keep the originals for labels and tooltips
fn plotted_values(datasets: &[Dataset], options: &ChartOptions) -> (Vec<Vec<f64>>, bool) {
    let normalized = options.normalize && datasets.len() > 1;
    let plotted = datasets
        .iter()
        .map(|d| if normalized { normalize(&d.values) } else { d.values.clone() })
        .collect();
    (plotted, normalized)
}

fn label_value(value: f64, unit: &str, decimals: usize) -> String {
    format_value(value, unit, decimals).unwrap_or_else(|_| raw_value(value, unit))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, chart_type: ChartType, datasets: &[Dataset], options: &ChartOptions) -> DrawingInstructions {
        let mut instructions = match chart_type {
            ChartType::Line | ChartType::Area => self.render_line(chart_type, datasets, options),
            ChartType::Bar => self.render_bar(datasets, options),
            ChartType::Pie | ChartType::Donut => self.render_pie(chart_type, datasets, options),
        };

        if options.show_legend {
            instructions.legend = datasets
                .iter()
                .map(|d| LegendEntry {
                    name: d.name.clone(),
                    color: d.color.clone(),
                    value: label_value(d.current_value(), &d.unit, options.decimals),
                })
                .collect();
        }
        instructions
    }

    fn render_line(&self, chart_type: ChartType, datasets: &[Dataset], options: &ChartOptions) -> DrawingInstructions {
        let mut instructions = DrawingInstructions::new(CHART_WIDTH, CHART_HEIGHT);
        let (plotted, normalized) = plotted_values(datasets, options);

        let mut low = plotted.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        let mut high = plotted.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        if !low.is_finite() || !high.is_finite() {
            return instructions;
        }
        if !normalized {
            low = options.y_min.unwrap_or(low);
            high = options.y_max.unwrap_or(high);
        }

        let usable = CHART_HEIGHT * (1.0 - options.headroom.clamp(0.0, 0.9));
        let range = high - low;
        let to_y = |value: f64| {
            if range.abs() <= f64::EPSILON {
                CHART_HEIGHT - usable / 2.0
            } else {
                let ratio = ((value - low) / range).clamp(0.0, 1.0);
                CHART_HEIGHT - ratio * usable
            }
        };

        if options.show_grid && options.grid_lines > 0 {
            let unit = if normalized { "%".to_string() } else { shared_unit(datasets) };
            for k in 0..=options.grid_lines {
                let fraction = k as f64 / options.grid_lines as f64;
                let y = CHART_HEIGHT - fraction * usable;
                let value = low + fraction * range;
                instructions.push(Primitive::Line {
                    from: Point::new(0.0, y),
                    to: Point::new(CHART_WIDTH, y),
                    stroke: GRID_COLOR.to_string(),
                    stroke_width: 0.5,
                });
                instructions.push(Primitive::Text {
                    at: Point::new(2.0, y - 1.0),
                    content: label_value(value, &unit, options.decimals),
                    anchor: TextAnchor::Start,
                    size: 4.0,
                    fill: LABEL_COLOR.to_string(),
                });
            }
        }

        for (index, (dataset, values)) in datasets.iter().zip(plotted.iter()).enumerate() {
            if values.is_empty() {
                continue;
            }
            let step = if values.len() > 1 {
                CHART_WIDTH / (values.len() - 1) as f64
            } else {
                0.0
            };
            let points: Vec<Point> = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let x = if values.len() > 1 { i as f64 * step } else { CHART_WIDTH / 2.0 };
                    Point::new(x, to_y(*v))
                })
                .collect();

            let line = to_path(&points, options.smooth);
            if chart_type == ChartType::Area || dataset.fill_area {
                instructions.push(Primitive::Path {
                    commands: close_to_baseline(line.clone(), CHART_HEIGHT),
                    stroke: None,
                    fill: Some(with_alpha(&dataset.color, AREA_ALPHA)),
                    stroke_width: 0.0,
                    dash: None,
                    hover: None,
                });
            }
            instructions.push(Primitive::Path {
                commands: line,
                stroke: Some(dataset.color.clone()),
                fill: None,
                stroke_width: dataset.line_width,
                dash: dataset.line_style.dash_array().map(|d| d.to_string()),
                hover: None,
            });

            // every point is hoverable, visible only when markers are enabled
            for (point_index, point) in points.iter().enumerate() {
                let target = HoverTarget { dataset: index, point: point_index };
                let fill = if dataset.show_points {
                    dataset.color.clone()
                } else {
                    "transparent".to_string()
                };
                instructions.push(Primitive::Circle {
                    center: *point,
                    radius: dataset.line_width.max(1.0) + 0.5,
                    fill,
                    hover: Some(target),
                });
                instructions.anchors.push(HoverAnchor { target, at: *point });
            }
        }
        instructions
    }

    fn render_bar(&self, datasets: &[Dataset], options: &ChartOptions) -> DrawingInstructions {
        let mut instructions = DrawingInstructions::new(CHART_WIDTH, CHART_HEIGHT);
        if datasets.is_empty() {
            return instructions;
        }

        let current: Vec<f64> = datasets.iter().map(|d| d.current_value()).collect();
        let largest = current.iter().copied().fold(0.0_f64, f64::max);
        let plot_height = CHART_HEIGHT - 2.0 * BAR_LABEL_SPACE;
        let slot = CHART_WIDTH / datasets.len() as f64;
        let bar_width = slot * BAR_FILL_RATIO;

        for (index, (dataset, value)) in datasets.iter().zip(current.iter()).enumerate() {
            let height = if largest > 0.0 {
                (value.max(0.0) / largest) * plot_height
            } else {
                0.0
            };
            let x = index as f64 * slot + (slot - bar_width) / 2.0;
            let y = BAR_LABEL_SPACE + plot_height - height;
            let center = x + bar_width / 2.0;
            let target = HoverTarget {
                dataset: index,
                point: dataset.values.len().saturating_sub(1),
            };

            instructions.push(Primitive::Rect {
                origin: Point::new(x, y),
                width: bar_width,
                height,
                fill: dataset.color.clone(),
                hover: Some(target),
            });
            instructions.anchors.push(HoverAnchor { target, at: Point::new(center, y) });
            instructions.push(Primitive::Text {
                at: Point::new(center, y - 2.0),
                content: label_value(*value, &dataset.unit, options.decimals),
                anchor: TextAnchor::Middle,
                size: 6.0,
                fill: LABEL_COLOR.to_string(),
            });
            instructions.push(Primitive::Text {
                at: Point::new(center, CHART_HEIGHT - 3.0),
                content: truncate_label(&dataset.name, BAR_NAME_CHARS),
                anchor: TextAnchor::Middle,
                size: 5.0,
                fill: LABEL_COLOR.to_string(),
            });
        }
        instructions
    }

    fn render_pie(&self, chart_type: ChartType, datasets: &[Dataset], options: &ChartOptions) -> DrawingInstructions {
        let mut instructions = DrawingInstructions::new(PIE_SIZE, PIE_SIZE);
        let current: Vec<f64> = datasets.iter().map(|d| d.current_value()).collect();
        let slices = compute_slices(&current);
        if slices.is_empty() {
            return instructions;
        }

        let center = Point::new(PIE_SIZE / 2.0, PIE_SIZE / 2.0);
        let outer = PIE_OUTER_RADIUS;
        let gap = options.slice_gap.max(0.0);
        let inner = match chart_type {
            ChartType::Donut => outer * DONUT_INNER_RATIO,
            // a small hole lets the gap separators meet evenly in the middle
            _ if gap > 0.0 => (gap * 1.5).min(outer * 0.15),
            _ => 0.0,
        };

        for slice in slices.iter().filter(|s| s.span() > 0.0) {
            let dataset = &datasets[slice.index];
            let target = HoverTarget {
                dataset: slice.index,
                point: dataset.values.len().saturating_sub(1),
            };
            instructions.push(Primitive::Path {
                commands: slice_path(center, inner, outer, slice.start_angle, slice.end_angle),
                stroke: None,
                fill: Some(dataset.color.clone()),
                stroke_width: 0.0,
                dash: None,
                hover: Some(target),
            });

            let mid = (slice.start_angle + slice.end_angle) / 2.0;
            let label_radius = if inner > 0.0 { (inner + outer) / 2.0 } else { outer * 0.6 };
            let label_radius = label_radius.min(outer * MAX_LABEL_RADIUS_RATIO);
            let label_at = polar(center, label_radius, mid);
            instructions.anchors.push(HoverAnchor { target, at: label_at });

            if slice.span() >= MIN_LABEL_SPAN_DEGREES {
                let value = label_value(slice.value, &dataset.unit, options.decimals);
                let lines: Vec<String> = match options.slice_labels {
                    SliceLabels::None => Vec::new(),
                    SliceLabels::Name => vec![dataset.name.clone()],
                    SliceLabels::Value => vec![value],
                    SliceLabels::NameAndValue => vec![dataset.name.clone(), value],
                };
                let offset = (lines.len() as f64 - 1.0) * 3.0;
                for (line_index, content) in lines.into_iter().enumerate() {
                    instructions.push(Primitive::Text {
                        at: Point::new(label_at.x, label_at.y - offset + line_index as f64 * 6.0),
                        content,
                        anchor: TextAnchor::Middle,
                        size: 5.0,
                        fill: SLICE_LABEL_COLOR.to_string(),
                    });
                }
            }
        }

        // separators painted in the card background read as real cuts
        let drawn = slices.iter().filter(|s| s.span() > 0.0).count();
        if gap > 0.0 && drawn > 1 {
            for slice in slices.iter().filter(|s| s.span() > 0.0) {
                instructions.push(Primitive::Line {
                    from: polar(center, inner, slice.start_angle),
                    to: polar(center, outer + 1.0, slice.start_angle),
                    stroke: options.background_color.clone(),
                    stroke_width: gap,
                });
            }
        }
        instructions
    }
}

/// Unit shared by every dataset, empty when they differ
fn shared_unit(datasets: &[Dataset]) -> String {
    match datasets.split_first() {
        Some((first, rest)) if rest.iter().all(|d| d.unit == first.unit) => first.unit.clone(),
        _ => String::new(),
    }
}

/// Point at `angle` degrees clockwise from 12 o'clock
pub fn polar(center: Point, radius: f64, angle: f64) -> Point {
    let radians = angle.to_radians();
    Point::new(center.x + radius * radians.sin(), center.y - radius * radians.cos())
}

fn slice_path(center: Point, inner: f64, outer: f64, start: f64, end: f64) -> Vec<PathCommand> {
    // a full circle cannot be one arc, split it in two halves
    if end - start >= 360.0 - 1e-9 {
        let mut commands = Vec::new();
        commands.extend(ring(center, outer, true));
        if inner > 0.0 {
            commands.extend(ring(center, inner, false));
        }
        return commands;
    }

    let large_arc = end - start > 180.0;
    let mut commands = vec![
        PathCommand::MoveTo { to: polar(center, outer, start) },
        PathCommand::ArcTo {
            radius: outer,
            large_arc,
            clockwise: true,
            to: polar(center, outer, end),
        },
    ];
    if inner > 0.0 {
        commands.push(PathCommand::LineTo { to: polar(center, inner, end) });
        commands.push(PathCommand::ArcTo {
            radius: inner,
            large_arc,
            clockwise: false,
            to: polar(center, inner, start),
        });
    } else {
        commands.push(PathCommand::LineTo { to: center });
    }
    commands.push(PathCommand::Close);
    commands
}

fn ring(center: Point, radius: f64, clockwise: bool) -> Vec<PathCommand> {
    vec![
        PathCommand::MoveTo { to: polar(center, radius, 0.0) },
        PathCommand::ArcTo {
            radius,
            large_arc: false,
            clockwise,
            to: polar(center, radius, 180.0),
        },
        PathCommand::ArcTo {
            radius,
            large_arc: false,
            clockwise,
            to: polar(center, radius, 0.0),
        },
        PathCommand::Close,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::dataset;

    fn paths(instructions: &DrawingInstructions) -> Vec<&Vec<PathCommand>> {
        instructions
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Path { commands, stroke: Some(_), .. } => Some(commands),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_slices_sum_to_full_circle_in_order() {
        let values = [3.0, 1.5, 7.25, 0.5, 12.0];
        let slices = compute_slices(&values);
        let total: f64 = slices.iter().map(|s| s.span()).sum();
        assert!((total - 360.0).abs() < 1e-9);
        for (i, slice) in slices.iter().enumerate() {
            assert_eq!(slice.index, i);
            if i > 0 {
                assert_eq!(slice.start_angle, slices[i - 1].end_angle);
            }
        }
        assert!(compute_slices(&[0.0, -2.0]).is_empty());
    }

    #[test]
    fn test_pie_scenario_seventy_thirty() {
        let slices = compute_slices(&[70.0, 30.0]);
        assert!((slices[0].start_angle - 0.0).abs() < 1e-9);
        assert!((slices[0].end_angle - 252.0).abs() < 1e-9);
        assert!((slices[1].start_angle - 252.0).abs() < 1e-9);
        assert!((slices[1].end_angle - 360.0).abs() < 1e-9);

        let datasets = vec![dataset("A", vec![70.0]), dataset("B", vec![30.0])];
        let instructions = ChartRenderer::new().render(ChartType::Pie, &datasets, &ChartOptions::default());
        let separators = instructions
            .primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Line { .. }))
            .count();
        assert_eq!(separators, 0);
        let slice_paths = instructions
            .primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Path { hover: Some(_), .. }))
            .count();
        assert_eq!(slice_paths, 2);
    }

    #[test]
    fn test_donut_inner_radius_and_gap_separators() {
        let datasets = vec![
            dataset("A", vec![50.0]),
            dataset("B", vec![30.0]),
            dataset("C", vec![20.0]),
        ];
        let options = ChartOptions {
            slice_gap: 2.0,
            background_color: "#123456".to_string(),
            ..ChartOptions::default()
        };
        let instructions = ChartRenderer::new().render(ChartType::Donut, &datasets, &options);

        let separators: Vec<&Primitive> = instructions
            .primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Line { .. }))
            .collect();
        assert_eq!(separators.len(), 3);
        if let Primitive::Line { from, stroke, stroke_width, .. } = separators[0] {
            assert_eq!(stroke, "#123456");
            assert_eq!(*stroke_width, 2.0);
            let radius = ((from.x - 50.0).powi(2) + (from.y - 50.0).powi(2)).sqrt();
            assert!((radius - PIE_OUTER_RADIUS * DONUT_INNER_RATIO).abs() < 1e-9);
        }
    }

    #[test]
    fn test_small_slices_have_no_labels_and_labels_stay_inside() {
        let datasets = vec![dataset("Big", vec![99.0]), dataset("Tiny", vec![1.0])];
        let options = ChartOptions {
            slice_labels: SliceLabels::Name,
            ..ChartOptions::default()
        };
        let instructions = ChartRenderer::new().render(ChartType::Pie, &datasets, &options);
        let labels: Vec<(&Point, &String)> = instructions
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { at, content, .. } => Some((at, content)),
                _ => None,
            })
            .collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].1, "Big");
        let radius = ((labels[0].0.x - 50.0).powi(2) + (labels[0].0.y - 50.0).powi(2)).sqrt();
        assert!(radius <= PIE_OUTER_RADIUS * MAX_LABEL_RADIUS_RATIO + 1e-9);
    }

    #[test]
    fn test_single_slice_is_full_ring() {
        let datasets = vec![dataset("Only", vec![5.0])];
        let instructions = ChartRenderer::new().render(ChartType::Donut, &datasets, &ChartOptions::default());
        let Some(Primitive::Path { commands, .. }) = instructions.primitives.first() else {
            panic!("expected a slice path");
        };
        let arcs = commands
            .iter()
            .filter(|c| matches!(c, PathCommand::ArcTo { .. }))
            .count();
        assert_eq!(arcs, 4);
    }

    #[test]
    fn test_normalize_bounds() {
        let normalized = normalize(&[5.0, 15.0, 10.0, 25.0]);
        assert_eq!(normalized.iter().copied().fold(f64::INFINITY, f64::min), 0.0);
        assert_eq!(normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max), 100.0);
        assert_eq!(normalize(&[7.0, 7.0, 7.0]), vec![50.0; 3]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalization_keeps_original_values_for_labels() {
        let datasets = vec![
            dataset("Power", vec![100.0, 2000.0]),
            dataset("Temp", vec![18.0, 22.0]),
        ];
        let options = ChartOptions {
            normalize: true,
            smooth: false,
            ..ChartOptions::default()
        };
        let instructions = ChartRenderer::new().render(ChartType::Line, &datasets, &options);

        // both series span the full usable height
        let line_paths = paths(&instructions);
        for commands in line_paths {
            let ys: Vec<f64> = commands.iter().filter_map(|c| c.end_point()).map(|p| p.y).collect();
            assert_eq!(ys[0], CHART_HEIGHT);
            assert!((ys[1] - CHART_HEIGHT * 0.1).abs() < 1e-9);
        }
        assert_eq!(instructions.legend[0].value, "2000.0");
        assert_eq!(instructions.legend[1].value, "22.0");
    }

    #[test]
    fn test_line_ramp_scenario() {
        let values: Vec<f64> = (0..24).map(|i| 10.0 + 20.0 * i as f64 / 23.0).collect();
        let datasets = vec![dataset("Ramp", values)];
        let options = ChartOptions {
            smooth: false,
            ..ChartOptions::default()
        };
        let instructions = ChartRenderer::new().render(ChartType::Line, &datasets, &options);

        let line_paths = paths(&instructions);
        assert_eq!(line_paths.len(), 1);
        let commands = line_paths[0];
        assert_eq!(commands.len(), 24);
        assert!(commands[1..].iter().all(|c| matches!(c, PathCommand::LineTo { .. })));
        let ys: Vec<f64> = commands.iter().filter_map(|c| c.end_point()).map(|p| p.y).collect();
        assert!(ys.windows(2).all(|w| w[1] < w[0]));
        // headroom keeps the peak off the top edge
        assert!(ys[23] > 0.0);
    }

    #[test]
    fn test_area_fill_and_grid() {
        let datasets = vec![dataset("A", vec![1.0, 3.0, 2.0])];
        let options = ChartOptions {
            show_grid: true,
            grid_lines: 2,
            ..ChartOptions::default()
        };
        let instructions = ChartRenderer::new().render(ChartType::Area, &datasets, &options);

        let fills = instructions
            .primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Path { fill: Some(_), .. }))
            .count();
        assert_eq!(fills, 1);
        let grid_labels: Vec<&String> = instructions
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(grid_labels, vec!["1.0", "2.0", "3.0"]);
        assert_eq!(instructions.anchors.len(), 3);
    }

    #[test]
    fn test_bars_compare_current_values() {
        let datasets = vec![
            dataset("Solar production", vec![5.0, 400.0]),
            dataset("Grid", vec![0.0, 200.0]),
        ];
        let instructions = ChartRenderer::new().render(ChartType::Bar, &datasets, &ChartOptions::default());
        let heights: Vec<f64> = instructions
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Rect { height, .. } => Some(*height),
                _ => None,
            })
            .collect();
        assert_eq!(heights.len(), 2);
        assert!((heights[0] - 2.0 * heights[1]).abs() < 1e-9);
        let names: Vec<&String> = instructions
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { content, size, .. } if *size == 5.0 => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["Solar produ…", "Grid"]);
    }
}
