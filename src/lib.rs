mod error;
mod ort_service;
mod prediction;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod model_service;

pub use app::start_app;
