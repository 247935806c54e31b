// Live state snapshot - last known state of every entity, refreshed by the host
use crate::application::history_repository::LiveStateProvider;
use crate::domain::telemetry::LiveState;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct StateSnapshot {
    states: RwLock<HashMap<String, LiveState>>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot
    pub fn replace(&self, states: HashMap<String, LiveState>) {
        let mut guard = self.states.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = states;
    }

    pub fn update(&self, source_id: &str, state: LiveState) {
        self.states
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(source_id.to_string(), state);
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LiveStateProvider for StateSnapshot {
    fn state(&self, source_id: &str) -> Option<LiveState> {
        self.states
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(source_id)
            .cloned()
    }
}
