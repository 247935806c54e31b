// Vector drawing instructions handed to the host UI layer
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo { to: Point },
    LineTo { to: Point },
    CubicTo { c1: Point, c2: Point, to: Point },
    ArcTo { radius: f64, large_arc: bool, clockwise: bool, to: Point },
    Close,
}

impl PathCommand {
    pub fn end_point(&self) -> Option<Point> {
        match self {
            PathCommand::MoveTo { to }
            | PathCommand::LineTo { to }
            | PathCommand::CubicTo { to, .. }
            | PathCommand::ArcTo { to, .. } => Some(*to),
            PathCommand::Close => None,
        }
    }
}

/// Identifies the data point behind a hoverable primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverTarget {
    pub dataset: usize,
    pub point: usize,
}

/// Where the tooltip of a hover target points at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverAnchor {
    pub target: HoverTarget,
    pub at: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    #[default]
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Path {
        commands: Vec<PathCommand>,
        stroke: Option<String>,
        fill: Option<String>,
        stroke_width: f64,
        dash: Option<String>,
        hover: Option<HoverTarget>,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: String,
        hover: Option<HoverTarget>,
    },
    Line {
        from: Point,
        to: Point,
        stroke: String,
        stroke_width: f64,
    },
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        fill: String,
        hover: Option<HoverTarget>,
    },
    Text {
        at: Point,
        content: String,
        anchor: TextAnchor,
        size: f64,
        fill: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub name: String,
    pub color: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingInstructions {
    pub width: f64,
    pub height: f64,
    pub primitives: Vec<Primitive>,
    pub legend: Vec<LegendEntry>,
    pub anchors: Vec<HoverAnchor>,
    /// History was rebuilt from current values only
    pub degraded: bool,
}

impl DrawingInstructions {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            primitives: Vec::new(),
            legend: Vec::new(),
            anchors: Vec::new(),
            degraded: false,
        }
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn hover_anchor(&self, target: HoverTarget) -> Option<Point> {
        self.anchors.iter().find(|a| a.target == target).map(|a| a.at)
    }
}
