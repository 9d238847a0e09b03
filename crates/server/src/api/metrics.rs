//! Prometheus metrics endpoint.

use axum::http::header;
use axum::response::IntoResponse;

use crate::AppResources;
use crate::api::health::MISC_TAG;

/// Prometheus metrics endpoint.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/metrics",
    tag = MISC_TAG,
    operation_id = "Prometheus Metrics",
    responses(
        (status = 200, description = "Prometheus metrics in text exposition format", body = String, content_type = "text/plain"),
    )
)]
pub async fn metrics(
    axum::Extension(resources): axum::Extension<AppResources>,
) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        resources.metrics.render(),
    )
}
