// Event bus fanning render requests and tooltip changes out to server-sent event clients
use crate::application::history_repository::RenderRequester;
use crate::application::tooltip::{TooltipContent, TooltipPosition, TooltipSink};
use crate::domain::module::ModuleId;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::RwLock;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    Render {
        module_id: String,
    },
    Tooltip {
        module_id: String,
        #[serde(flatten)]
        tooltip: TooltipState,
    },
}

impl GraphEvent {
    fn name(&self) -> &'static str {
        match self {
            GraphEvent::Render { .. } => "render",
            GraphEvent::Tooltip { .. } => "tooltip",
        }
    }
}

/// Last known state of a module's tooltip element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipState {
    pub visible: bool,
    pub position: Option<TooltipPosition>,
    pub content: Option<TooltipContent>,
}

pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
    tooltips: RwLock<HashMap<String, TooltipState>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            tooltips: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    pub fn tooltip(&self, module_id: &str) -> Option<TooltipState> {
        self.tooltips
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(module_id)
            .cloned()
    }

    fn publish(&self, event: GraphEvent) {
        // no subscribers is fine, the next client renders from scratch
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    fn set_tooltip(&self, module_id: &str, tooltip: TooltipState) {
        self.tooltips
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(module_id.to_string(), tooltip.clone());
        self.publish(GraphEvent::Tooltip {
            module_id: module_id.to_string(),
            tooltip,
        });
    }
}

impl RenderRequester for EventBus {
    fn request_render(&self, module_id: &ModuleId) {
        self.publish(GraphEvent::Render {
            module_id: module_id.clone(),
        });
    }
}

impl TooltipSink for EventBus {
    fn create(&self, module_id: &str) {
        self.set_tooltip(
            module_id,
            TooltipState {
                visible: false,
                position: None,
                content: None,
            },
        );
    }

    fn show(&self, module_id: &str, position: TooltipPosition, content: &TooltipContent) {
        self.set_tooltip(
            module_id,
            TooltipState {
                visible: true,
                position: Some(position),
                content: Some(content.clone()),
            },
        );
    }

    fn hide(&self, module_id: &str) {
        let current = self.tooltip(module_id);
        self.set_tooltip(
            module_id,
            TooltipState {
                visible: false,
                position: current.as_ref().and_then(|t| t.position),
                content: current.and_then(|t| t.content),
            },
        );
    }

    fn remove(&self, module_id: &str) {
        let removed = self
            .tooltips
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(module_id)
            .is_some();
        if removed {
            self.publish(GraphEvent::Tooltip {
                module_id: module_id.to_string(),
                tooltip: TooltipState {
                    visible: false,
                    position: None,
                    content: None,
                },
            });
        }
    }
}

/// Turn a broadcast receiver into an event stream; lagging clients skip what they missed
pub fn stream_from_receiver(
    mut rx: broadcast::Receiver<GraphEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => yield Ok(sse),
                    Err(e) => tracing::warn!("Failed to encode graph event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event client lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

pub fn sse_response(
    rx: broadcast::Receiver<GraphEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(stream_from_receiver(rx)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooltip::Placement;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_render_requests_reach_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.request_render(&"graphs-1".to_string());

        assert_eq!(
            rx.recv().await.unwrap(),
            GraphEvent::Render {
                module_id: "graphs-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_stream_yields_events() {
        let bus = EventBus::new();
        let stream = stream_from_receiver(bus.subscribe());
        futures::pin_mut!(stream);
        bus.request_render(&"graphs-1".to_string());

        assert!(stream.next().await.unwrap().is_ok());
    }

    #[test]
    fn test_tooltip_state_tracks_show_and_hide() {
        let bus = EventBus::new();
        let content = TooltipContent {
            series: "Temperature".to_string(),
            time_label: "12:00".to_string(),
            value: "21.0°C".to_string(),
        };
        let position = TooltipPosition {
            left: 10.0,
            top: 20.0,
            placement: Placement::Above,
        };

        bus.create("graphs-1");
        assert!(!bus.tooltip("graphs-1").unwrap().visible);
        bus.show("graphs-1", position, &content);
        assert!(bus.tooltip("graphs-1").unwrap().visible);
        bus.hide("graphs-1");

        let hidden = bus.tooltip("graphs-1").unwrap();
        assert!(!hidden.visible);
        assert_eq!(hidden.content, Some(content));
    }

    #[tokio::test]
    async fn test_removed_tooltip_is_forgotten() {
        let bus = EventBus::new();
        bus.create("graphs-1");
        let mut rx = bus.subscribe();

        bus.remove("graphs-1");
        assert!(bus.tooltip("graphs-1").is_none());
        assert!(matches!(
            rx.recv().await.unwrap(),
            GraphEvent::Tooltip { tooltip: TooltipState { visible: false, .. }, .. }
        ));

        bus.remove("graphs-1");
        assert!(rx.try_recv().is_err());
    }
}
