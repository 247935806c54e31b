// Graph widget engine for home-automation dashboards
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
