//! HTTP handlers for the metrics endpoint and dashboard.

use crate::web::html::render_dashboard;
use crate::web::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

/// `GET /metrics`: the registry in Prometheus text format.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.registry.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.registry.content_type())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /`: the HTML dashboard for the latest cycle.
pub async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let latest = state.dashboard.latest();
    Html(render_dashboard(latest.as_deref(), state.refresh_secs))
}

/// Any other path: 404 with an empty body.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
