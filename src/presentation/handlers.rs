// HTTP request handlers
use crate::application::tooltip::ContainerSize;
use crate::domain::drawing::HoverTarget;
use crate::domain::error::GraphError;
use crate::domain::module::ModuleConfig;
use crate::infrastructure::event_stream::sse_response;
use crate::infrastructure::http_response::svg_response;
use crate::infrastructure::svg_mapper::instructions_to_svg;
use crate::presentation::app_state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct HoverRequest {
    pub dataset: usize,
    pub point: usize,
    /// Size of the element the chart is drawn into, in pixels
    pub width: f64,
    pub height: f64,
}

impl IntoResponse for GraphError {
    fn into_response(self) -> Response {
        let status = match &self {
            GraphError::Config(_) | GraphError::ParseFailure(_) | GraphError::Format(_) => StatusCode::BAD_REQUEST,
            GraphError::NoData(_) => StatusCode::NOT_FOUND,
            GraphError::FetchFailure(_) | GraphError::StorageFailure(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/modules", get(list_modules))
        .route("/modules/:id", get(get_module).put(put_module).delete(delete_module))
        .route("/modules/:id/chart", get(get_chart))
        .route("/modules/:id/chart.svg", get(get_chart_svg))
        .route("/modules/:id/hover", post(hover))
        .route("/modules/:id/leave", post(leave))
        .route("/modules/:id/tooltip", get(get_tooltip))
        .route("/events", get(events))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Every mounted module with its configuration and load state
pub async fn list_modules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.graph_service.modules())
}

/// What the host paints for a module: a chart or a placeholder
pub async fn get_module(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.graph_service.render(&id) {
        Some(rendered) => Json(rendered).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Parse a module configuration sent as JSON or, with a TOML content type, as TOML
pub fn parse_module_config(headers: &HeaderMap, body: &str) -> Result<ModuleConfig, GraphError> {
    let is_toml = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("toml"))
        .unwrap_or(false);

    if is_toml {
        toml::from_str(body).map_err(|e| GraphError::ParseFailure(e.to_string()))
    } else {
        Ok(serde_json::from_str(body)?)
    }
}

/// Mount a module or replace its configuration
pub async fn put_module(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: String,
) -> Response {
    let mut config = match parse_module_config(&headers, &body) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Rejected configuration for module {}: {}", id, e);
            return e.into_response();
        }
    };
    config.id = id.clone();

    if let Err(e) = state.graph_service.configure(config) {
        tracing::warn!("Rejected configuration for module {}: {}", id, e);
        return e.into_response();
    }
    match state.graph_service.render(&id) {
        Some(rendered) => Json(rendered).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

pub async fn delete_module(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> StatusCode {
    if state.graph_service.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Drawing instructions of a module that has data
pub async fn get_chart(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.graph_service.instructions(&id) {
        Some(instructions) => Json(instructions).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn get_chart_svg(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let Some(instructions) = state.graph_service.instructions(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let title = state.graph_service.module(&id).and_then(|m| m.config.title);
    match svg_response(instructions_to_svg(&instructions, title.as_deref())) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub async fn hover(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<HoverRequest>,
) -> Response {
    let target = HoverTarget {
        dataset: request.dataset,
        point: request.point,
    };
    let container = ContainerSize {
        width: request.width,
        height: request.height,
    };
    match state.graph_service.hover(&id, target, container) {
        Some(content) => Json(content).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn leave(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> StatusCode {
    state.graph_service.leave(&id);
    StatusCode::NO_CONTENT
}

pub async fn get_tooltip(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.events.tooltip(&id) {
        Some(tooltip) => Json(tooltip).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Server-sent events: render requests and tooltip changes
pub async fn events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse_response(state.events.subscribe())
}
