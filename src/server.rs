use crate::{
    config::{Config, CorsConfig},
    model_service::ModelService,
    routes::api_routes,
    telemetry::Metrics,
};
use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Json, Response},
    Router,
};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct SharedState {
    /// `None` when no artifact was deployed; fixed for the process lifetime.
    pub model: Option<Arc<dyn ModelService>>,
    pub metrics: Arc<Metrics>,
}

impl SharedState {
    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }
}

pub fn cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allows_any_origin() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .trim()
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin `{}`", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Bounds every request by `timeout`. Timed out requests get the same
/// `{"error": ...}` body as every other failure.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(map_response(timeout_as_json))
}

async fn timeout_as_json(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(serde_json::json!({ "error": "Request timed out" })),
    )
        .into_response()
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        state.metrics.install_global();
        let metrics_layer = HttpMetricsLayerBuilder::new().build();
        let cors = cors_layer(&config.cors)?;

        let router = Router::new()
            .merge(api_routes())
            .with_state(state)
            .layer(metrics_layer);
        let router = with_request_timeout(
            router,
            Duration::from_secs(config.server.request_timeout_secs),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_service::{FeatureVector, ModelError, ModelService};
    use crate::routes::test_support::{post_predict, router, send};
    use std::sync::Arc;

    struct SlowModel;

    impl ModelService for SlowModel {
        fn predict(&self, _features: FeatureVector) -> Result<i64, ModelError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_timeout_answers_json() {
        let app = with_request_timeout(
            router(Some(Arc::new(SlowModel))),
            Duration::from_millis(20),
        );
        let (status, body) = send(app, post_predict(r#"{"temperature": 185, "pressure": 25}"#)).await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body, serde_json::json!({"error": "Request timed out"}));
    }

    #[test]
    fn test_cors_accepts_empty_origin_list() {
        let config = CorsConfig {
            allowed_origins: vec![],
        };
        assert!(!config.allows_any_origin());
        assert!(cors_layer(&config).is_ok());
    }

    #[test]
    fn test_cors_accepts_explicit_origins() {
        let config = CorsConfig {
            allowed_origins: vec!["http://localhost:5173".into(), "https://ops.example".into()],
        };
        assert!(cors_layer(&config).is_ok());
    }

    #[test]
    fn test_cors_rejects_invalid_origin() {
        let config = CorsConfig {
            allowed_origins: vec!["http://bad\norigin".into()],
        };
        assert!(cors_layer(&config).is_err());
    }
}
