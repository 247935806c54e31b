// Rendered module - what the host paints for one graphs module
use serde::Serialize;

use super::drawing::DrawingInstructions;
use super::load_state::LoadPhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placeholder {
    /// Configuration lists no sources
    NoEntities,
    Loading,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleBody {
    Chart(DrawingInstructions),
    Placeholder { placeholder: Placeholder },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedModule {
    pub module_id: String,
    pub title: Option<String>,
    pub phase: LoadPhase,
    pub header: Option<HeaderValue>,
    pub body: ModuleBody,
}

impl RenderedModule {
    pub fn placeholder(module_id: String, title: Option<String>, phase: LoadPhase, placeholder: Placeholder) -> Self {
        Self {
            module_id,
            title,
            phase,
            header: None,
            body: ModuleBody::Placeholder { placeholder },
        }
    }
}
