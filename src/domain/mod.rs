// Domain layer - Plain data types shared by every other layer
pub mod dashboard;
pub mod drawing;
pub mod error;
pub mod load_state;
pub mod module;
pub mod telemetry;
