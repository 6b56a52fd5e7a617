use crate::{
    error::PredictError,
    model_service::ModelError,
    prediction::{BatchInput, PredictionResponse},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::Json,
};
use std::time::Instant;
use tracing::instrument;

#[instrument(skip(state, body))]
pub async fn predict(
    State(state): State<SharedState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PredictionResponse>, PredictError> {
    let result = classify(&state, &body).await;

    match &result {
        Ok(response) => {
            tracing::debug!(
                temperature = response.input.temperature,
                pressure = response.input.pressure,
                verdict = response.prediction.as_str(),
                "Batch classified"
            );
            state.metrics.record_prediction(response.prediction);
        }
        Err(e) => {
            match e {
                PredictError::InvalidInput(_) => tracing::debug!("Rejected request: {}", e),
                _ => tracing::error!("Prediction failed: {}", e),
            }
            state.metrics.record_error(e.kind());
        }
    }

    result.map(Json)
}

async fn classify(
    state: &SharedState,
    body: &Result<Bytes, BytesRejection>,
) -> Result<PredictionResponse, PredictError> {
    let model = state.model.clone().ok_or(PredictError::ModelUnavailable)?;
    let body = body.as_ref().map_err(|e| {
        PredictError::InvalidInput(format!("Unable to read request body: {}", e.body_text()))
    })?;
    let input = BatchInput::from_body(body)?;

    let start = Instant::now();
    let features = input.features();
    let label = tokio::task::spawn_blocking(move || model.predict(features))
        .await
        .map_err(|e| ModelError::Inference(format!("inference task aborted: {}", e)))??;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64);

    Ok(PredictionResponse::new(input, label))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{
        post_predict, router, send, BrokenModel, FixedModel, ThresholdModel,
    };
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pass_scenario() {
        let app = router(Some(Arc::new(FixedModel(1))));
        let (status, body) = send(app, post_predict(r#"{"temperature": 185, "pressure": 25}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "input": {"temperature": 185.0, "pressure": 25.0},
                "prediction": "Pass",
                "is_golden_batch": true
            })
        );
    }

    #[tokio::test]
    async fn test_fail_scenario() {
        let app = router(Some(Arc::new(FixedModel(0))));
        let (status, body) = send(app, post_predict(r#"{"temperature": 185, "pressure": 25}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Fail");
        assert_eq!(body["is_golden_batch"], false);
    }

    #[tokio::test]
    async fn test_exact_pass_body() {
        let app = router(Some(Arc::new(FixedModel(1))));
        let response = tower::ServiceExt::oneshot(
            app,
            post_predict(r#"{"temperature": 185, "pressure": 25}"#),
        )
        .await
        .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        assert_eq!(
            &bytes[..],
            br#"{"input":{"temperature":185.0,"pressure":25.0},"prediction":"Pass","is_golden_batch":true}"#
        );
    }

    #[tokio::test]
    async fn test_identical_input_yields_identical_output() {
        let app = router(Some(Arc::new(ThresholdModel {
            min_temperature: 180.0,
        })));

        for body in [
            r#"{"temperature": 185, "pressure": 25}"#,
            r#"{"temperature": 150, "pressure": 25}"#,
        ] {
            let first = send(app.clone(), post_predict(body)).await;
            let second = send(app.clone(), post_predict(body)).await;
            assert_eq!(first, second);
            assert_eq!(
                first.1["is_golden_batch"] == true,
                first.1["prediction"] == "Pass"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let app = router(Some(Arc::new(FixedModel(1))));

        for body in [r#"{"pressure": 25}"#, r#"{"temperature": 185}"#, "{}"] {
            let (status, body) = send(app.clone(), post_predict(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_non_numeric_temperature_is_bad_request() {
        let app = router(Some(Arc::new(FixedModel(1))));
        let (status, body) = send(
            app,
            post_predict(r#"{"temperature": "scorching", "pressure": 25}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Field 'temperature' must be a number");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = router(Some(Arc::new(FixedModel(1))));
        let (status, body) = send(app, post_predict("temperature=185&pressure=25")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Malformed JSON body"));
    }

    #[tokio::test]
    async fn test_numeric_strings_are_coerced() {
        let app = router(Some(Arc::new(FixedModel(0))));
        let (status, body) = send(
            app,
            post_predict(r#"{"temperature": "185", "pressure": "25.5"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["input"], json!({"temperature": 185.0, "pressure": 25.5}));
    }

    #[tokio::test]
    async fn test_missing_model_is_server_error() {
        let app = router(None);

        for body in [r#"{"temperature": 185, "pressure": 25}"#, "not json"] {
            let (status, body) = send(app.clone(), post_predict(body)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({"error": "Model not loaded"}));
        }
    }

    #[tokio::test]
    async fn test_inference_failure_is_server_error() {
        let app = router(Some(Arc::new(BrokenModel)));
        let (status, body) = send(app, post_predict(r#"{"temperature": 185, "pressure": 25}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Prediction failed: model returned no label");
    }

    fn oversized_predict() -> Request<Body> {
        let padding = "x".repeat(3 * 1024 * 1024);
        let body = format!(
            r#"{{"temperature": 185, "pressure": 25, "padding": "{}"}}"#,
            padding
        );
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_bad_request() {
        let app = router(Some(Arc::new(FixedModel(1))));
        let (status, body) = send(app, oversized_predict()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unable to read request body"));
    }

    #[tokio::test]
    async fn test_oversized_body_without_model_is_model_not_loaded() {
        let (status, body) = send(router(None), oversized_predict()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Model not loaded"}));
    }
}
