pub mod api;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod polyline;
pub mod scoring;
pub mod store;
pub mod telemetry;
