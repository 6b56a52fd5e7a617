use crate::server::SharedState;
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::Serialize;

const MESSAGE: &str = "Golden Batch API is running. POST to /predict to use.";

#[derive(Serialize)]
pub struct Status {
    status: &'static str,
    message: &'static str,
    model_loaded: bool,
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    Json(Status {
        status: "online",
        message: MESSAGE,
        model_loaded: state.model_loaded(),
    })
}
