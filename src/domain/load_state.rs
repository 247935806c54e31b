// Per-module loading bookkeeping
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPhase {
    #[default]
    Idle,
    FastPath,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ModuleLoadState {
    pub is_loading: bool,
    pub has_scheduled_fetch: bool,
    pub last_error: Option<String>,
}
