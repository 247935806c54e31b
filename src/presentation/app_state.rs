// Application state for HTTP handlers
use crate::application::graph_service::GraphService;
use crate::infrastructure::event_stream::EventBus;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub graph_service: GraphService,
    pub events: Arc<EventBus>,
}
