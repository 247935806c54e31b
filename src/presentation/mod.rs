// Presentation layer - HTTP surface of the graphs engine
pub mod app_state;
pub mod handlers;
