// Application layer - Engine components and use cases
pub mod aligner;
pub mod chart_renderer;
pub mod color;
pub mod curve;
pub mod data_source_loader;
pub mod formatting;
pub mod graph_service;
pub mod history_cache;
pub mod history_repository;
pub mod synthetic;
pub mod tooltip;

#[cfg(test)]
pub mod testing;
