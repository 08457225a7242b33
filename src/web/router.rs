//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::handlers;
use crate::web::AppState;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::dashboard))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::Cycle;
    use crate::publish::{DashboardState, MetricsRegistry};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router, DashboardState) {
        let dashboard = DashboardState::new();
        let state = AppState::new(MetricsRegistry::new().unwrap(), dashboard.clone(), 1);
        (create_app(&WebConfig::default(), state), dashboard)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let (app, _) = app();
        let (status, content_type, _) = get(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_dashboard_route() {
        let (app, dashboard) = app();
        dashboard.replace(Cycle::new(5));
        let (status, content_type, body) = get(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(body.contains("cycle 5"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_empty_404() {
        let (app, _) = app();
        let (status, _, body) = get(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }
}
