mod health;
mod metrics;
mod predict;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use health::healthcheck;
use metrics::metrics_handler;
use predict::predict;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(healthcheck))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics_handler))
}
