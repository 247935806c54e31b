// Curve smoothing - polyline or Catmull-Rom path through chart points
use crate::domain::drawing::{PathCommand, Point};

const TENSION: f64 = 0.5;

/// Path through every point, straight segments or an interpolating Catmull-Rom spline
pub fn to_path(points: &[Point], smooth: bool) -> Vec<PathCommand> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut commands = Vec::with_capacity(points.len());
    commands.push(PathCommand::MoveTo { to: *first });

    if !smooth || points.len() < 3 {
        commands.extend(points[1..].iter().map(|p| PathCommand::LineTo { to: *p }));
        return commands;
    }

    let last = points.len() - 1;
    for i in 0..last {
        // neighbours clamp to the ends of the sequence
        let p0 = points[i.saturating_sub(1)];
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points[(i + 2).min(last)];

        let k = TENSION / 3.0;
        let c1 = Point::new(p1.x + (p2.x - p0.x) * k, p1.y + (p2.y - p0.y) * k);
        let c2 = Point::new(p2.x - (p3.x - p1.x) * k, p2.y - (p3.y - p1.y) * k);
        commands.push(PathCommand::CubicTo { c1, c2, to: p2 });
    }
    commands
}

/// Close a line path down to `baseline` so it can be filled
pub fn close_to_baseline(mut commands: Vec<PathCommand>, baseline: f64) -> Vec<PathCommand> {
    let first = commands.first().and_then(|c| c.end_point());
    let last = commands.last().and_then(|c| c.end_point());
    if let (Some(first), Some(last)) = (first, last) {
        commands.push(PathCommand::LineTo { to: Point::new(last.x, baseline) });
        commands.push(PathCommand::LineTo { to: Point::new(first.x, baseline) });
        commands.push(PathCommand::Close);
    }
    commands
}

/// Evaluate a cubic Bezier at `t` in [0, 1]
pub fn cubic_at(from: Point, c1: Point, c2: Point, to: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point::new(
        a * from.x + b * c1.x + c * c2.x + d * to.x,
        a * from.y + b * c1.y + c * c2.y + d * to.y,
    )
}
