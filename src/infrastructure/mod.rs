// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod event_stream;
pub mod ha_rest;
pub mod ha_websocket;
pub mod http_response;
pub mod preferred_history;
pub mod state_snapshot;
pub mod store;
pub mod svg_mapper;
